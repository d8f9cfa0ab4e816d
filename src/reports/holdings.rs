//! 个股机构持仓和基金持仓对比

use anyhow::Result;

use crate::models::table::DataTable;
use crate::queries::{FundHoldingsQuery, QueryContext};

use super::output;

const INSTITUTION_TYPE_COLUMN: &str = "持股机构类型";

pub async fn run_institutional(ctx: QueryContext, code: &str, period: Option<&str>) -> Result<()> {
    let table = FundHoldingsQuery::new(ctx)
        .query_institutional_holdings(code, period)
        .await?;
    if table.is_empty() {
        println!("{}: 未查询到机构持仓数据", code);
        return Ok(());
    }

    println!("\n{} 机构持仓（{}），共 {} 条:", code, period.unwrap_or("最近一个季度"), table.len());
    output::print_table(&table);
    if let Some(summary) = count_by_type(&table) {
        println!("\n按机构类型统计:");
        output::print_table(&summary);
    }
    Ok(())
}

/// 各类机构的家数，按家数降序
pub fn count_by_type(table: &DataTable) -> Option<DataTable> {
    if !table.has_column(INSTITUTION_TYPE_COLUMN) {
        return None;
    }
    let mut summary = table.group_count(INSTITUTION_TYPE_COLUMN, "机构数");
    summary.sort_by("机构数", true);
    Some(summary)
}

pub async fn run_fund_compare(ctx: QueryContext, fund_codes: &[String], period: Option<&str>) -> Result<()> {
    let comparison = FundHoldingsQuery::new(ctx)
        .compare_fund_holdings(fund_codes, period)
        .await;
    if comparison.is_empty() {
        println!("有持仓数据的基金不足两只，无法对比");
    } else {
        output::print_table(&comparison);
    }
    Ok(())
}

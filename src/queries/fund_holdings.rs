//! 基金持仓查询与机构偏好分析

use serde_json::Value;
use std::collections::HashSet;

use crate::datasource::DataSourceType;
use crate::error::DataResult;
use crate::models::table::DataTable;

use super::base::{batch_query, BatchResult, QueryContext};

const STOCK_COLUMNS: [&str; 3] = ["股票代码", "代码", "股票名称"];
const STOCK_NAME_COLUMNS: [&str; 4] = ["股票名称", "名称", "name", "股票简称"];
const MARKET_VALUE_COLUMNS: [&str; 4] = ["持仓市值", "持仓市值(万元)", "市值", "market_value"];

/// 未指定基金时取基金列表的前若干只
const DEFAULT_FUND_SAMPLE: usize = 100;

/// 机构偏好分析结果
#[derive(Debug, Clone)]
pub struct PreferenceAnalysis {
    /// 按持有基金数降序的前 N 只股票
    pub top_holdings: DataTable,
    /// 合并后的全部持仓明细
    pub all_holdings: DataTable,
}

pub struct FundHoldingsQuery {
    ctx: QueryContext,
    source: Option<DataSourceType>,
}

impl FundHoldingsQuery {
    pub fn new(ctx: QueryContext) -> Self {
        Self { ctx, source: None }
    }

    pub fn with_source(mut self, source: Option<DataSourceType>) -> Self {
        self.source = source;
        self
    }

    pub async fn query_fund_holdings(&self, fund_code: &str, period: Option<&str>) -> DataResult<DataTable> {
        self.ctx
            .run(self.source, |ds| async move { ds.query_fund_holdings(fund_code, period).await })
            .await
    }

    pub async fn query_multiple_funds(&self, fund_codes: &[String], period: Option<&str>) -> BatchResult<DataTable> {
        batch_query(fund_codes, |code| async move { self.query_fund_holdings(&code, period).await }).await
    }

    pub async fn query_fund_basic(&self) -> DataResult<DataTable> {
        self.ctx
            .run(self.source, |ds| async move { ds.query_fund_basic().await })
            .await
    }

    pub async fn query_fund_nav(
        &self,
        fund_code: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> DataResult<DataTable> {
        self.ctx
            .run(self.source, |ds| async move {
                ds.query_fund_nav(fund_code, start_date, end_date).await
            })
            .await
    }

    pub async fn query_institutional_holdings(&self, stock_code: &str, period: Option<&str>) -> DataResult<DataTable> {
        self.ctx
            .run(self.source, |ds| async move {
                ds.query_institutional_holdings(stock_code, period).await
            })
            .await
    }

    pub async fn query_fund_rank(&self, fund_type: &str, sort_by: &str, top_n: Option<usize>) -> DataResult<DataTable> {
        self.ctx
            .run(self.source, |ds| async move { ds.query_fund_rank(fund_type, sort_by, top_n).await })
            .await
    }

    pub async fn query_fund_industry_allocation(&self, date: &str) -> DataResult<DataTable> {
        self.ctx
            .run(self.source, |ds| async move { ds.query_fund_industry_allocation(date).await })
            .await
    }

    /// 分析多个基金的重仓股，找出被最多基金持有的股票
    ///
    /// 没有指定基金时取基金列表前 100 只；没有任何持仓数据时返回 None
    pub async fn analyze_institutional_preference(
        &self,
        fund_codes: Option<&[String]>,
        period: Option<&str>,
        top_n: usize,
    ) -> DataResult<Option<PreferenceAnalysis>> {
        let fund_codes: Vec<String> = match fund_codes {
            Some(codes) => codes.to_vec(),
            None => {
                let fund_basic = self.query_fund_basic().await?;
                if fund_basic.is_empty() {
                    log::warn!("无法获取基金列表");
                    return Ok(None);
                }
                fund_basic
                    .head(DEFAULT_FUND_SAMPLE)
                    .iter_rows()
                    .filter_map(|r| r.get_str("基金代码"))
                    .collect()
            }
        };

        let holdings = self.query_multiple_funds(&fund_codes, period).await;
        let mut tables = Vec::new();
        for (fund_code, table) in holdings {
            let Some(mut table) = table.filter(|t| !t.is_empty()) else {
                continue;
            };
            table.set_constant_column("基金代码", Value::String(fund_code.clone()));
            log::debug!("基金 {} 持仓数据列名: {:?}", fund_code, table.columns());
            tables.push(table);
        }
        if tables.is_empty() {
            log::warn!("未获取到任何基金持仓数据");
            return Ok(None);
        }

        let combined = DataTable::concat(&tables);
        match rank_holdings(&combined, top_n) {
            Some(top_holdings) => Ok(Some(PreferenceAnalysis {
                top_holdings,
                all_holdings: combined,
            })),
            None => Ok(None),
        }
    }

    /// 对比多个基金的持仓：持仓股票数和共同持仓数
    ///
    /// 有持仓数据的基金少于两只时返回空表
    pub async fn compare_fund_holdings(&self, fund_codes: &[String], period: Option<&str>) -> DataTable {
        let holdings = self.query_multiple_funds(fund_codes, period).await;
        compare_holdings(&holdings)
    }
}

/// 按股票统计持有基金数，附加股票名称和持仓市值
pub fn rank_holdings(combined: &DataTable, top_n: usize) -> Option<DataTable> {
    let Some(stock_col) = combined.find_column(&STOCK_COLUMNS) else {
        log::warn!("无法识别持仓数据中的股票代码列");
        return None;
    };

    let mut counts = combined.group_count(&stock_col, "持有基金数");
    counts.sort_by("持有基金数", true);
    counts.rename_column(&stock_col, "股票代码");

    match combined.find_column(&STOCK_NAME_COLUMNS) {
        Some(name_col) if name_col != stock_col => {
            log::info!("找到股票名称列: {}", name_col);
            let mut names = combined.group_first(&stock_col, &name_col);
            names.rename_column(&stock_col, "股票代码");
            names.rename_column(&name_col, "股票名称");
            counts = counts.left_join_on(&names, "股票代码");
        }
        Some(_) => {
            // 股票列本身就是名称
            counts.with_column("股票名称", |r| r.get("股票代码").cloned().unwrap_or(Value::Null));
        }
        None => {
            log::warn!("未找到股票名称列，可用列: {:?}", combined.columns());
            counts.set_constant_column("股票名称", Value::String("N/A".to_string()));
        }
    }

    if let Some(value_col) = combined.find_column(&MARKET_VALUE_COLUMNS) {
        let mut values = combined.group_sum(&stock_col, &value_col, "持仓市值");
        values.rename_column(&stock_col, "股票代码");
        counts = counts.left_join_on(&values, "股票代码");
    }

    let top = counts.head(top_n);
    let mut order = vec!["股票代码", "股票名称", "持有基金数"];
    if top.has_column("持仓市值") {
        order.push("持仓市值");
    }
    Some(top.select(&order))
}

pub fn compare_holdings(holdings: &BatchResult<DataTable>) -> DataTable {
    let mut fund_stocks: Vec<(String, HashSet<String>)> = Vec::new();
    for (fund_code, table) in holdings {
        let Some(table) = table.as_ref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let Some(col) = table.find_column(&["股票代码", "代码"]) else {
            continue;
        };
        let stocks = table
            .iter_rows()
            .filter_map(|r| r.get_str(&col))
            .collect::<HashSet<_>>();
        fund_stocks.push((fund_code.clone(), stocks));
    }

    let mut result = DataTable::new(["基金代码", "持仓股票数", "共同持仓数"]);
    if fund_stocks.len() < 2 {
        return result;
    }
    let common = fund_stocks
        .iter()
        .skip(1)
        .fold(fund_stocks[0].1.clone(), |acc, (_, s)| {
            acc.intersection(s).cloned().collect()
        });
    for (fund_code, stocks) in &fund_stocks {
        result.push_row(vec![
            Value::String(fund_code.clone()),
            Value::from(stocks.len() as u64),
            Value::from(common.len() as u64),
        ]);
    }
    result
}

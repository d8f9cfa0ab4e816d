//! 资产负债表查询

use crate::datasource::{DataSourceType, ReportPeriod};
use crate::error::DataResult;
use crate::models::table::DataTable;

use super::base::{batch_query, success_count, BatchResult, QueryContext};

const NUMERIC_COLUMNS: [&str; 8] = [
    "liabilityToAsset",
    "assetLiabRatio",
    "currentRatio",
    "quickRatio",
    "cashRatio",
    "YOYLiability",
    "YOYAsset",
    "YOYEquity",
];

pub struct BalanceQuery {
    ctx: QueryContext,
    source: Option<DataSourceType>,
}

impl BalanceQuery {
    pub fn new(ctx: QueryContext) -> Self {
        Self { ctx, source: None }
    }

    /// 指定数据源（仅对管理器上下文生效）
    pub fn with_source(mut self, source: Option<DataSourceType>) -> Self {
        self.source = source;
        self
    }

    /// 查询单个公司的资产负债表
    pub async fn query(&self, code: &str, year: Option<i32>, quarter: Option<u8>) -> DataResult<DataTable> {
        let period = ReportPeriod::new(year, quarter);
        let mut table = self
            .ctx
            .run(self.source, |ds| async move { ds.query_balance_sheet(code, period).await })
            .await?;
        if !table.is_empty() {
            log::info!("成功查询 {} 的资产负债表数据，共 {} 条记录", code, table.len());
            table.coerce_numeric(&NUMERIC_COLUMNS);
        }
        Ok(table)
    }

    pub async fn query_multiple(
        &self,
        codes: &[String],
        year: Option<i32>,
        quarter: Option<u8>,
    ) -> BatchResult<DataTable> {
        log::info!("开始批量查询 {} 个公司的资产负债表数据", codes.len());
        let results = batch_query(codes, |code| async move { self.query(&code, year, quarter).await }).await;
        log::info!("批量查询完成，成功 {}/{}", success_count(&results), codes.len());
        results
    }
}

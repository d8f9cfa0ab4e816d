//! 现金流量查询

use chrono::Datelike;
use serde_json::{Map, Value};

use crate::datasource::{DataSourceType, ReportPeriod};
use crate::error::{DataResult, DataSourceError};
use crate::models::response::beijing_now;
use crate::models::table::DataTable;

use super::base::{batch_query, success_count, BatchResult, QueryContext};

const NUMERIC_COLUMNS: [&str; 7] = [
    "CAToAsset",
    "NCAToAsset",
    "NCFFromFAToAsset",
    "CCE",
    "CCEAdd",
    "FCFF",
    "FCFE",
];

/// 默认对比指标
pub const DEFAULT_METRICS: [&str; 3] = ["CAToAsset", "NCAToAsset", "NCFFromFAToAsset"];

pub struct CashFlowQuery {
    ctx: QueryContext,
    source: Option<DataSourceType>,
}

impl CashFlowQuery {
    pub fn new(ctx: QueryContext) -> Self {
        Self { ctx, source: None }
    }

    pub fn with_source(mut self, source: Option<DataSourceType>) -> Self {
        self.source = source;
        self
    }

    pub async fn query(&self, code: &str, year: Option<i32>, quarter: Option<u8>) -> DataResult<DataTable> {
        let period = ReportPeriod::new(year, quarter);
        let mut table = self
            .ctx
            .run(self.source, |ds| async move { ds.query_cash_flow(code, period).await })
            .await?;
        if !table.is_empty() {
            log::info!("成功查询 {} 的现金流量数据，共 {} 条记录", code, table.len());
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
        log::info!("开始批量查询 {} 个公司的现金流量数据", codes.len());
        let results = batch_query(codes, |code| async move { self.query(&code, year, quarter).await }).await;
        log::info!("批量查询完成，成功 {}/{}", success_count(&results), codes.len());
        results
    }

    /// 逐年查询并合并，end_year 默认为今年；没有数据的年份跳过
    pub async fn query_history(
        &self,
        code: &str,
        start_year: i32,
        end_year: Option<i32>,
        quarter: Option<u8>,
    ) -> DataResult<DataTable> {
        let end_year = end_year.unwrap_or_else(|| beijing_now().year());
        if start_year > end_year {
            return Err(DataSourceError::InvalidRequest(format!(
                "起始年份不能大于结束年份: {} > {}",
                start_year, end_year
            )));
        }
        log::info!("查询 {} 从 {} 到 {} 的现金流量数据", code, start_year, end_year);

        let mut tables = Vec::new();
        for year in start_year..=end_year {
            match self.query(code, Some(year), quarter).await {
                Ok(table) if !table.is_empty() => tables.push(table),
                Ok(_) => {}
                Err(e) => log::error!("查询 {} {}年现金流量数据失败: {}", code, year, e),
            }
        }

        if tables.is_empty() {
            log::warn!("未查询到 {} 的历史数据", code);
            return Ok(DataTable::default());
        }
        let result = DataTable::concat(&tables);
        log::info!("成功查询 {} 的历史数据，共 {} 条记录", code, result.len());
        Ok(result)
    }

    /// 对比多个公司的现金流量指标，每个公司取最新一条记录
    pub async fn compare_companies(
        &self,
        codes: &[String],
        year: i32,
        quarter: Option<u8>,
        metrics: Option<&[&str]>,
    ) -> DataTable {
        let metrics = metrics.unwrap_or(&DEFAULT_METRICS);
        let results = self.query_multiple(codes, Some(year), quarter).await;

        let mut columns = vec!["code"];
        columns.extend_from_slice(metrics);
        let mut comparison = DataTable::new(columns);
        for (code, table) in results {
            let Some(last) = table.as_ref().and_then(|t| t.last_row()) else {
                continue;
            };
            let mut record = Map::new();
            record.insert("code".to_string(), Value::String(code.clone()));
            for metric in metrics {
                let value = last.get(metric).cloned().unwrap_or(Value::Null);
                record.insert(metric.to_string(), value);
            }
            comparison.push_record(record);
        }

        if comparison.is_empty() {
            log::warn!("没有可对比的数据");
        } else {
            log::info!("成功对比 {} 个公司的现金流量数据", comparison.len());
        }
        comparison
    }
}

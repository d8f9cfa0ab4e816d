//! baostock 数据源
//!
//! 基于 TCP 会话，查询前需要登录

pub mod client;
pub mod protocol;

use async_trait::async_trait;
use chrono::{Datelike, Duration};
use std::sync::Arc;

use super::{code, DailyQuery, DataSource, DataSourceType, ReportPeriod};
use crate::connection::BaostockConnection;
use crate::error::DataResult;
use crate::models::response::beijing_now;
use crate::models::table::DataTable;

pub const DEFAULT_DAILY_FIELDS: &str =
    "date,code,open,high,low,close,volume,amount,adjustflag,turn,tradestatus,pctChg,isST";

pub struct BaostockDataSource {
    connection: Arc<BaostockConnection>,
}

impl BaostockDataSource {
    pub fn new(connection: Arc<BaostockConnection>) -> Self {
        Self { connection }
    }
}

/// `YYYYMMDD` 转为 `YYYY-MM-DD`，其他格式原样返回
fn dashed_date(date: &str) -> String {
    let date = date.trim();
    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}-{}", &date[..4], &date[4..6], &date[6..])
    } else {
        date.to_string()
    }
}

/// 默认日期区间：一年前至今天
fn default_window() -> (String, String) {
    let today = beijing_now().date_naive();
    let start = today
        .with_year(today.year() - 1)
        .unwrap_or_else(|| today - Duration::days(365));
    (
        start.format("%Y-%m-%d").to_string(),
        today.format("%Y-%m-%d").to_string(),
    )
}

#[async_trait]
impl DataSource for BaostockDataSource {
    fn source_type(&self) -> DataSourceType {
        DataSourceType::Baostock
    }

    async fn connect(&self) -> DataResult<()> {
        self.connection.login().await
    }

    async fn disconnect(&self) -> DataResult<()> {
        self.connection.logout().await
    }

    fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    fn normalize_code(&self, code: &str) -> String {
        code::to_baostock(code)
    }

    async fn query_balance_sheet(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        self.ensure_connected()?;
        let (year, quarter) = period.resolve()?;
        let code = self.normalize_code(code);
        log::debug!("查询资产负债表: {} {}Q{}", code, year, quarter);
        self.connection
            .client()
            .await
            .query_balance_data(&code, year, quarter)
            .await
    }

    async fn query_cash_flow(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        self.ensure_connected()?;
        let (year, quarter) = period.resolve()?;
        let code = self.normalize_code(code);
        log::debug!("查询现金流量表: {} {}Q{}", code, year, quarter);
        self.connection
            .client()
            .await
            .query_cash_flow_data(&code, year, quarter)
            .await
    }

    async fn query_income_statement(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        self.ensure_connected()?;
        let (year, quarter) = period.resolve()?;
        let code = self.normalize_code(code);
        self.connection
            .client()
            .await
            .query_profit_data(&code, year, quarter)
            .await
    }

    async fn query_stock_basic(&self) -> DataResult<DataTable> {
        self.ensure_connected()?;
        self.connection.client().await.query_stock_basic("", "").await
    }

    async fn query_daily_data(&self, code: &str, query: &DailyQuery) -> DataResult<DataTable> {
        self.ensure_connected()?;
        let code = self.normalize_code(code);
        let (default_start, default_end) = default_window();
        let start = query.start_date.as_deref().map(dashed_date).unwrap_or(default_start);
        let end = query.end_date.as_deref().map(dashed_date).unwrap_or(default_end);
        let fields = query.fields.as_deref().unwrap_or(DEFAULT_DAILY_FIELDS);
        let frequency = query.frequency.as_deref().unwrap_or("d");
        let adjust = query.adjust.as_deref().unwrap_or("3");

        self.connection
            .client()
            .await
            .query_history_k_data_plus(&code, fields, &start, &end, frequency, adjust)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaostockConfig;
    use crate::error::DataSourceError;
    use super::client::{fake_server, BaostockClient};

    fn source(port: u16) -> BaostockDataSource {
        let config = BaostockConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..BaostockConfig::default()
        };
        BaostockDataSource::new(Arc::new(BaostockConnection::new(BaostockClient::new(config, 5))))
    }

    #[test]
    fn test_dashed_date() {
        assert_eq!(dashed_date("20240102"), "2024-01-02");
        assert_eq!(dashed_date("2024-01-02"), "2024-01-02");
    }

    #[test]
    fn test_default_window_spans_one_year() {
        let (start, end) = default_window();
        let start_year: i32 = start[..4].parse().unwrap();
        let end_year: i32 = end[..4].parse().unwrap();
        assert!(end_year - start_year <= 1);
        assert!(start < end);
    }

    #[tokio::test]
    async fn test_query_requires_connection() {
        let server = fake_server::start().await;
        let ds = source(server.port);
        let err = ds.query_balance_sheet("600000", ReportPeriod::year(2023)).await.unwrap_err();
        assert!(matches!(err, DataSourceError::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_balance_sheet_normalizes_code() {
        let server = fake_server::start().await;
        let ds = source(server.port);
        ds.connect().await.unwrap();

        let table = ds.query_balance_sheet("600000", ReportPeriod::year(2023)).await.unwrap();
        assert_eq!(table.cell(0, "code"), Some(&serde_json::json!("sh.600000")));

        let empty = ds.query_cash_flow("sh.999999", ReportPeriod::year(2023)).await.unwrap();
        assert!(empty.is_empty());

        ds.disconnect().await.unwrap();
        assert!(!ds.is_connected());
    }

    #[tokio::test]
    async fn test_invalid_quarter() {
        let server = fake_server::start().await;
        let ds = source(server.port);
        ds.connect().await.unwrap();
        let err = ds
            .query_income_statement("600000", ReportPeriod::new(Some(2023), Some(7)))
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unsupported_fund_queries() {
        let server = fake_server::start().await;
        let ds = source(server.port);
        let err = ds.query_fund_holdings("000001", None).await.unwrap_err();
        assert!(matches!(err, DataSourceError::Unsupported { .. }));
    }
}

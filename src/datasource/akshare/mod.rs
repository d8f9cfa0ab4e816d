//! akshare 风格数据源
//!
//! 直接抓取新浪财经、东方财富、天天基金和巨潮资讯的公开接口，无需登录

pub mod cninfo;
pub mod common;
pub mod eastmoney;
pub mod sina;

use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{code, DailyQuery, DataSource, DataSourceType, ReportPeriod};
use crate::config::{AkshareConfig, AppConfig};
use crate::error::DataResult;
use crate::models::response::beijing_now;
use crate::models::table::DataTable;
use sina::ReportKind;

pub struct AkshareDataSource {
    client: Client,
    config: AkshareConfig,
    connected: AtomicBool,
}

impl AkshareDataSource {
    pub fn new(config: AkshareConfig, timeout_secs: u64, connect_timeout_secs: u64) -> DataResult<Self> {
        Ok(Self {
            client: common::build_client(timeout_secs, connect_timeout_secs)?,
            config,
            connected: AtomicBool::new(false),
        })
    }

    pub fn from_config(config: &AppConfig) -> DataResult<Self> {
        Self::new(
            config.sources.akshare.clone(),
            config.query.timeout_secs,
            config.query.connect_timeout_secs,
        )
    }

    /// 报表接口一次返回全部报告期，季度只做校验
    async fn finance_report(&self, code: &str, period: ReportPeriod, kind: ReportKind) -> DataResult<DataTable> {
        self.ensure_connected()?;
        period.resolve()?;
        let paper_code = code::to_sina(code);
        let table =
            sina::fetch_finance_report(&self.client, &self.config.sina_quotes_url, &paper_code, kind)
                .await?;
        Ok(filter_year(table, period.year))
    }
}

/// 指定年份时只保留报告期包含该年份的行
fn filter_year(table: DataTable, year: Option<i32>) -> DataTable {
    match year {
        Some(y) if !table.is_empty() => table.filter_contains("报告期", &y.to_string()),
        _ => table,
    }
}

/// 最近一个已结束的季度，形如 `20243`
fn last_finished_quarter() -> String {
    let today = beijing_now().date_naive();
    let quarter = (today.month() - 1) / 3;
    if quarter == 0 {
        format!("{}4", today.year() - 1)
    } else {
        format!("{}{}", today.year(), quarter)
    }
}

fn compact_date(date: &str) -> String {
    date.trim().replace('-', "")
}

#[async_trait]
impl DataSource for AkshareDataSource {
    fn source_type(&self) -> DataSourceType {
        DataSourceType::Akshare
    }

    async fn connect(&self) -> DataResult<()> {
        if self.connected.swap(true, Ordering::SeqCst) {
            log::info!("已经连接到AkShare");
        } else {
            log::info!("连接AkShare成功");
        }
        Ok(())
    }

    async fn disconnect(&self) -> DataResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            log::info!("断开AkShare成功");
        } else {
            log::info!("未连接AkShare，无需断开");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn normalize_code(&self, code: &str) -> String {
        code::to_plain(code)
    }

    async fn query_balance_sheet(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        self.finance_report(code, period, ReportKind::Balance).await
    }

    async fn query_cash_flow(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        self.finance_report(code, period, ReportKind::CashFlow).await
    }

    async fn query_income_statement(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        self.finance_report(code, period, ReportKind::Income).await
    }

    async fn query_stock_basic(&self) -> DataResult<DataTable> {
        self.ensure_connected()?;
        eastmoney::fetch_stock_list(&self.client, &self.config.eastmoney_push_url).await
    }

    async fn query_daily_data(&self, code: &str, query: &DailyQuery) -> DataResult<DataTable> {
        self.ensure_connected()?;
        let secid = code::to_eastmoney_secid(code);
        let start = query
            .start_date
            .as_deref()
            .map(compact_date)
            .unwrap_or_else(|| "19900101".to_string());
        let end = query
            .end_date
            .as_deref()
            .map(compact_date)
            .unwrap_or_else(|| beijing_now().format("%Y%m%d").to_string());
        let adjust = query.adjust.as_deref().unwrap_or("qfq");

        eastmoney::fetch_daily_kline(
            &self.client,
            &self.config.eastmoney_push_his_url,
            &secid,
            &start,
            &end,
            adjust,
        )
        .await
    }

    async fn query_stock_fundamental(&self, code: &str, year: Option<i32>) -> DataResult<DataTable> {
        self.query_financial_indicator(code, year).await
    }

    /// 未指定年份时取今年和去年两页
    async fn query_financial_indicator(&self, code: &str, year: Option<i32>) -> DataResult<DataTable> {
        self.ensure_connected()?;
        let code = self.normalize_code(code);
        let years = match year {
            Some(y) => vec![y],
            None => {
                let current = beijing_now().year();
                vec![current - 1, current]
            }
        };

        let mut tables = Vec::with_capacity(years.len());
        for y in years {
            let table =
                sina::fetch_financial_guideline(&self.client, &self.config.sina_money_url, &code, y)
                    .await?;
            if !table.is_empty() {
                tables.push(table);
            }
        }
        if tables.is_empty() {
            return Ok(DataTable::new(["报告期"]));
        }
        let mut result = DataTable::concat(&tables);
        result.sort_by("报告期", false);
        Ok(filter_year(result, year))
    }

    async fn query_fund_holdings(&self, fund_code: &str, period: Option<&str>) -> DataResult<DataTable> {
        self.ensure_connected()?;
        let (year, quarter) = eastmoney::parse_holdings_period(period)?;
        let base = &self.config.eastmoney_fundf10_url;

        let mut table = eastmoney::fetch_fund_holdings(&self.client, base, fund_code, year).await?;
        if table.is_empty() && period.is_none() {
            log::info!("基金 {} {}年暂无持仓数据，尝试{}年", fund_code, year, year - 1);
            table = eastmoney::fetch_fund_holdings(&self.client, base, fund_code, year - 1).await?;
        }
        Ok(match quarter {
            Some(q) => eastmoney::filter_quarter(&table, q),
            None => table,
        })
    }

    async fn query_fund_basic(&self) -> DataResult<DataTable> {
        self.ensure_connected()?;
        eastmoney::fetch_fund_list(&self.client, &self.config.eastmoney_fund_url).await
    }

    async fn query_fund_nav(
        &self,
        fund_code: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> DataResult<DataTable> {
        self.ensure_connected()?;
        eastmoney::fetch_fund_nav(
            &self.client,
            &self.config.eastmoney_fund_url,
            fund_code,
            start_date,
            end_date,
        )
        .await
    }

    async fn query_fund_rank(&self, fund_type: &str, sort_by: &str, top_n: Option<usize>) -> DataResult<DataTable> {
        self.ensure_connected()?;
        eastmoney::fetch_fund_rank(
            &self.client,
            &self.config.eastmoney_fund_url,
            fund_type,
            sort_by,
            top_n,
        )
        .await
    }

    /// period 为空时取最近一个已结束的季度；只给年份时取第 4 季度
    async fn query_institutional_holdings(&self, stock_code: &str, period: Option<&str>) -> DataResult<DataTable> {
        self.ensure_connected()?;
        let quarter = match period {
            Some(p) if !p.trim().is_empty() => {
                let (year, q) = eastmoney::parse_holdings_period(Some(p))?;
                format!("{}{}", year, q.unwrap_or(4))
            }
            _ => last_finished_quarter(),
        };
        let code = self.normalize_code(stock_code);
        sina::fetch_institutional_holdings(&self.client, &self.config.sina_vip_url, &code, &quarter).await
    }

    async fn query_fund_industry_allocation(&self, date: &str) -> DataResult<DataTable> {
        self.ensure_connected()?;
        cninfo::fetch_industry_allocation(&self.client, &self.config.cninfo_url, date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataSourceError;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn connected_source(server: &MockServer) -> AkshareDataSource {
        let ds = AkshareDataSource::new(AkshareConfig::with_base_url(&server.uri()), 5, 5).unwrap();
        ds.connect().await.unwrap();
        ds
    }

    fn report_body() -> serde_json::Value {
        json!({"result": {"status": {"code": 0}, "data": {
            "report_date": [{"date_value": "20231231"}, {"date_value": "20221231"}],
            "report_list": {
                "20231231": {"publish_date": "20240330", "data": [
                    {"item_title": "资产总计", "item_value": "1000.5"},
                    {"item_title": "负债合计", "item_value": "600"}
                ]},
                "20221231": {"publish_date": "20230330", "data": [
                    {"item_title": "资产总计", "item_value": "900"},
                    {"item_title": "负债合计", "item_value": "500"}
                ]}
            }
        }}})
    }

    #[test]
    fn test_last_finished_quarter_format() {
        let q = last_finished_quarter();
        assert_eq!(q.len(), 5);
        assert!(matches!(q.chars().last(), Some('1'..='4')));
    }

    /// 测试连接状态切换
    #[tokio::test]
    async fn test_connect_flips_state() {
        let server = MockServer::start().await;
        let ds = AkshareDataSource::new(AkshareConfig::with_base_url(&server.uri()), 5, 5).unwrap();
        assert!(!ds.is_connected());

        let err = ds.query_stock_basic().await.unwrap_err();
        assert!(matches!(err, DataSourceError::NotConnected(_)));

        ds.connect().await.unwrap();
        ds.connect().await.unwrap();
        assert!(ds.is_connected());
        ds.disconnect().await.unwrap();
        assert!(!ds.is_connected());
    }

    #[tokio::test]
    async fn test_balance_sheet_filters_year() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(common::SINA_FINANCE_REPORT_PATH))
            .and(query_param("paperCode", "sh600000"))
            .and(query_param("source", "fzb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(report_body()))
            .mount(&server)
            .await;

        let ds = connected_source(&server).await;
        let all = ds.query_balance_sheet("sh.600000", ReportPeriod::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let only = ds.query_balance_sheet("600000", ReportPeriod::year(2023)).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only.row(0).unwrap().get_f64("资产总计"), Some(1000.5));
    }

    /// 测试季度越界时不发请求直接报参数错误
    #[tokio::test]
    async fn test_report_rejects_invalid_quarter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(common::SINA_FINANCE_REPORT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(report_body()))
            .expect(0)
            .mount(&server)
            .await;

        let ds = connected_source(&server).await;
        for kind in ["balance", "cashflow", "income"] {
            let period = ReportPeriod::new(Some(2023), Some(7));
            let result = match kind {
                "balance" => ds.query_balance_sheet("600000", period).await,
                "cashflow" => ds.query_cash_flow("600000", period).await,
                _ => ds.query_income_statement("600000", period).await,
            };
            assert!(
                matches!(result, Err(DataSourceError::InvalidRequest(_))),
                "{}: {:?}",
                kind,
                result.map(|t| t.len())
            );
        }
    }

    #[tokio::test]
    async fn test_daily_data_uses_secid_and_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(common::EM_KLINE_PATH))
            .and(query_param("secid", "0.000001"))
            .and(query_param("beg", "20240101"))
            .and(query_param("end", "20240131"))
            .and(query_param("fqt", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
                "code": "000001",
                "klines": ["2024-01-02,9.39,9.21,9.42,9.21,1158366,1075742252.45,2.24,-1.91,-0.18,0.60"]
            }})))
            .mount(&server)
            .await;

        let ds = connected_source(&server).await;
        let query = DailyQuery {
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("20240131".to_string()),
            ..DailyQuery::default()
        };
        let table = ds.query_daily_data("000001.SZ", &query).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.row(0).unwrap().get_f64("收盘"), Some(9.21));
    }

    #[tokio::test]
    async fn test_institutional_holdings_quarter_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(common::SINA_INSTITUTE_HOLD_PATH))
            .and(query_param("symbol", "600519"))
            .and(query_param("quarter", "20243"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"var details=({data:{"基金":[{"SYMBOL":"600519","HOLDNUM":"120.5"}]}});"#,
            ))
            .mount(&server)
            .await;

        let ds = connected_source(&server).await;
        let table = ds.query_institutional_holdings("sh.600519", Some("2024Q3")).await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, "持股机构类型"), Some(&json!("基金")));
    }
}

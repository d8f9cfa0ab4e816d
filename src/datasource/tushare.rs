//! tushare pro 数据源
//!
//! HTTP 接口：POST `{api_name, token, params, fields}`，
//! 返回 `{code, msg, data: {fields, items}}`

use async_trait::async_trait;
use chrono::{Datelike, Duration};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};

use super::akshare::common;
use super::{code, DailyQuery, DataSource, DataSourceType, ReportPeriod};
use crate::config::{AppConfig, TushareConfig};
use crate::error::{DataResult, DataSourceError};
use crate::models::response::beijing_now;
use crate::models::table::DataTable;

const BALANCE_FIELDS: &str = "ts_code,ann_date,f_ann_date,end_date,report_type,comp_type,total_assets,total_liab,total_hldr_eqy_exc_min_int";
const CASHFLOW_FIELDS: &str = "ts_code,ann_date,f_ann_date,end_date,comp_type,report_type,n_cashflow_act,n_cashflow_inv_act,n_cash_flows_fnc_act";
const INCOME_FIELDS: &str = "ts_code,ann_date,f_ann_date,end_date,report_type,comp_type,basic_eps,diluted_eps,total_revenue,revenue,operate_profit,total_profit,n_income,n_income_attr_p";
const STOCK_BASIC_FIELDS: &str = "ts_code,symbol,name,area,industry,market,list_date";

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: Value,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<Value>>,
}

pub struct TushareDataSource {
    client: Client,
    config: TushareConfig,
    connected: AtomicBool,
}

impl TushareDataSource {
    pub fn new(config: TushareConfig, timeout_secs: u64, connect_timeout_secs: u64) -> DataResult<Self> {
        if config.token.is_empty() {
            log::warn!("未提供Tushare token，部分功能可能受限");
        }
        Ok(Self {
            client: common::build_client(timeout_secs, connect_timeout_secs)?,
            config,
            connected: AtomicBool::new(false),
        })
    }

    pub fn from_config(config: &AppConfig) -> DataResult<Self> {
        Self::new(
            config.sources.tushare.clone(),
            config.query.timeout_secs,
            config.query.connect_timeout_secs,
        )
    }

    /// 调用 pro 接口
    async fn call(&self, api_name: &str, params: Value, fields: &str) -> DataResult<DataTable> {
        self.ensure_connected()?;
        if self.config.token.is_empty() {
            return Err(DataSourceError::Auth(format!(
                "调用 {} 需要 Tushare token",
                api_name
            )));
        }

        log::debug!("📡 请求 Tushare {}: {}", api_name, params);
        let request = ApiRequest {
            api_name,
            token: &self.config.token,
            params,
            fields,
        };
        let response = self
            .client
            .post(&self.config.base_url)
            .json(&request)
            .send()
            .await?;
        let response = common::check_status(response, api_name)?;
        let reply: ApiReply = response.json().await?;
        reply_to_table(reply)
    }
}

fn reply_to_table(reply: ApiReply) -> DataResult<DataTable> {
    if reply.code != 0 {
        let msg = reply.msg.unwrap_or_default();
        // 40101: token 无效
        if reply.code == 40101 {
            return Err(DataSourceError::Auth(msg));
        }
        return Err(DataSourceError::vendor("tushare", reply.code.to_string(), msg));
    }
    Ok(match reply.data {
        Some(data) => DataTable::from_rows(data.fields, data.items),
        None => DataTable::default(),
    })
}

/// 报告期参数，例如 2023 年第 3 季度为 `20230931`
pub fn period_param(period: &ReportPeriod) -> Option<String> {
    match (period.year, period.quarter) {
        (Some(y), Some(4)) | (Some(y), None) => Some(format!("{}1231", y)),
        (Some(y), Some(q)) => Some(format!("{}{:02}31", y, q as u32 * 3)),
        (None, _) => None,
    }
}

fn report_params(ts_code: &str, period: &ReportPeriod) -> DataResult<Value> {
    if let Some(q) = period.quarter {
        if !(1..=4).contains(&q) {
            return Err(DataSourceError::InvalidRequest(format!(
                "季度必须在 1-4 之间: {}",
                q
            )));
        }
    }
    let mut params = json!({ "ts_code": ts_code });
    if let Some(p) = period_param(period) {
        params["period"] = Value::String(p);
    }
    Ok(params)
}

#[async_trait]
impl DataSource for TushareDataSource {
    fn source_type(&self) -> DataSourceType {
        DataSourceType::Tushare
    }

    async fn connect(&self) -> DataResult<()> {
        if self.connected.swap(true, Ordering::SeqCst) {
            log::info!("已经连接到Tushare");
        } else {
            log::info!("连接Tushare成功");
        }
        Ok(())
    }

    async fn disconnect(&self) -> DataResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            log::info!("断开Tushare成功");
        } else {
            log::info!("未连接Tushare，无需断开");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn normalize_code(&self, code: &str) -> String {
        code::to_tushare(code)
    }

    async fn query_balance_sheet(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        let params = report_params(&self.normalize_code(code), &period)?;
        self.call("balancesheet", params, BALANCE_FIELDS).await
    }

    async fn query_cash_flow(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        let params = report_params(&self.normalize_code(code), &period)?;
        self.call("cashflow", params, CASHFLOW_FIELDS).await
    }

    async fn query_income_statement(&self, code: &str, period: ReportPeriod) -> DataResult<DataTable> {
        let params = report_params(&self.normalize_code(code), &period)?;
        self.call("income", params, INCOME_FIELDS).await
    }

    async fn query_stock_basic(&self) -> DataResult<DataTable> {
        let params = json!({ "exchange": "", "list_status": "L" });
        self.call("stock_basic", params, STOCK_BASIC_FIELDS).await
    }

    /// 默认区间为一年前至今天
    async fn query_daily_data(&self, code: &str, query: &DailyQuery) -> DataResult<DataTable> {
        let today = beijing_now().date_naive();
        let end = query
            .end_date
            .as_deref()
            .map(|d| d.trim().replace('-', ""))
            .unwrap_or_else(|| today.format("%Y%m%d").to_string());
        let start = query
            .start_date
            .as_deref()
            .map(|d| d.trim().replace('-', ""))
            .unwrap_or_else(|| {
                today
                    .with_year(today.year() - 1)
                    .unwrap_or_else(|| today - Duration::days(365))
                    .format("%Y%m%d")
                    .to_string()
            });
        let params = json!({
            "ts_code": self.normalize_code(code),
            "start_date": start,
            "end_date": end,
        });
        self.call("daily", params, "").await
    }
}

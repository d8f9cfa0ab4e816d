use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;

use crate::datasource::{DailyQuery, DataSourceManager, DataSourceType, ReportPeriod};
use crate::error::DataSourceError;
use crate::queries::{BalanceQuery, CashFlowQuery, FundHoldingsQuery, FundamentalQuery, QueryContext};

use super::table_response;

/// 财务报表查询参数
#[derive(Debug, Deserialize)]
pub struct ReportParams {
    pub year: Option<i32>,
    pub quarter: Option<u8>,
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct DailyParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub adjust: Option<String>,
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct SourceParam {
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub start_year: i32,
    pub end_year: Option<i32>,
    pub quarter: Option<u8>,
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    /// 逗号分隔的股票代码
    pub codes: String,
    pub year: i32,
    pub quarter: Option<u8>,
    /// 逗号分隔的指标，默认 CAToAsset,NCAToAsset,NCFFromFAToAsset
    pub metrics: Option<String>,
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct FundamentalParams {
    pub year: Option<i32>,
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct InstitutionalParams {
    /// `2024Q3`、`20240930` 或年份
    pub period: Option<String>,
    pub source: Option<DataSourceType>,
}

/// 拆分逗号分隔的参数，忽略空项
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn context(manager: web::Data<DataSourceManager>) -> QueryContext {
    QueryContext::Manager(manager.into_inner())
}

pub async fn get_balance(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<ReportParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let result = BalanceQuery::new(context(manager))
        .with_source(params.source)
        .query(&code, params.year, params.quarter)
        .await;
    Ok(table_response(result))
}

pub async fn get_cashflow(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<ReportParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let result = CashFlowQuery::new(context(manager))
        .with_source(params.source)
        .query(&code, params.year, params.quarter)
        .await;
    Ok(table_response(result))
}

pub async fn get_income(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<ReportParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let period = ReportPeriod::new(params.year, params.quarter);
    let result = context(manager)
        .run(params.source, |ds| {
            let code = code.clone();
            async move { ds.query_income_statement(&code, period).await }
        })
        .await;
    Ok(table_response(result))
}

pub async fn get_daily(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<DailyParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let params = params.into_inner();
    let query = DailyQuery {
        start_date: params.start_date,
        end_date: params.end_date,
        adjust: params.adjust,
        ..DailyQuery::default()
    };
    let result = context(manager)
        .run(params.source, |ds| {
            let (code, query) = (code.clone(), query.clone());
            async move { ds.query_daily_data(&code, &query).await }
        })
        .await;
    Ok(table_response(result))
}

pub async fn get_cashflow_history(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<HistoryParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let result = CashFlowQuery::new(context(manager))
        .with_source(params.source)
        .query_history(&code, params.start_year, params.end_year, params.quarter)
        .await;
    Ok(table_response(result))
}

pub async fn compare_cashflow(
    manager: web::Data<DataSourceManager>,
    params: web::Query<CompareParams>,
) -> Result<HttpResponse> {
    let codes = split_list(&params.codes);
    if codes.is_empty() {
        return Ok(table_response(Err(DataSourceError::InvalidRequest(
            "codes 不能为空".to_string(),
        ))));
    }
    let metrics = params.metrics.as_deref().map(split_list);
    let metric_refs: Option<Vec<&str>> = metrics
        .as_ref()
        .map(|m| m.iter().map(String::as_str).collect());
    let table = CashFlowQuery::new(context(manager))
        .with_source(params.source)
        .compare_companies(&codes, params.year, params.quarter, metric_refs.as_deref())
        .await;
    Ok(table_response(Ok(table)))
}

pub async fn get_fundamental(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<FundamentalParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let result = FundamentalQuery::new(context(manager))
        .with_source(params.source)
        .query(&code, params.year)
        .await;
    Ok(table_response(result))
}

pub async fn get_institutional(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<InstitutionalParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let result = FundHoldingsQuery::new(context(manager))
        .with_source(params.source)
        .query_institutional_holdings(&code, params.period.as_deref())
        .await;
    Ok(table_response(result))
}

pub async fn list_stocks(
    manager: web::Data<DataSourceManager>,
    params: web::Query<SourceParam>,
) -> Result<HttpResponse> {
    let result = context(manager)
        .run(params.source, |ds| async move { ds.query_stock_basic().await })
        .await;
    Ok(table_response(result))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stocks")
            .route("/basic", web::get().to(list_stocks))
            .route("/cashflow/compare", web::get().to(compare_cashflow))
            .route("/{code}/balance", web::get().to(get_balance))
            .route("/{code}/cashflow", web::get().to(get_cashflow))
            .route("/{code}/cashflow/history", web::get().to(get_cashflow_history))
            .route("/{code}/fundamental", web::get().to(get_fundamental))
            .route("/{code}/institutional", web::get().to(get_institutional))
            .route("/{code}/income", web::get().to(get_income))
            .route("/{code}/daily", web::get().to(get_daily)),
    );
}

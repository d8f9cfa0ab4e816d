use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;

use crate::datasource::{DataSourceManager, DataSourceType};
use crate::error::DataSourceError;
use crate::queries::{FundHoldingsQuery, QueryContext};

use super::stocks::split_list;
use super::table_response;

#[derive(Debug, Deserialize)]
pub struct HoldingsParams {
    /// `2024Q3`、`20240930` 或年份
    pub period: Option<String>,
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct NavParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct RankParams {
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_fund_type")]
    pub fund_type: String,
    pub top_n: Option<usize>,
    pub source: Option<DataSourceType>,
}

fn default_sort_by() -> String {
    "近1年".to_string()
}

fn default_fund_type() -> String {
    "全部".to_string()
}

#[derive(Debug, Deserialize)]
pub struct IndustryParams {
    /// 报告日期 `YYYYMMDD`
    pub date: Option<String>,
    pub source: Option<DataSourceType>,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    /// 逗号分隔的基金代码，至少两只
    pub codes: String,
    pub period: Option<String>,
    pub source: Option<DataSourceType>,
}

fn query(manager: web::Data<DataSourceManager>, source: Option<DataSourceType>) -> FundHoldingsQuery {
    FundHoldingsQuery::new(QueryContext::Manager(manager.into_inner())).with_source(source)
}

pub async fn get_holdings(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<HoldingsParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let result = query(manager, params.source)
        .query_fund_holdings(&code, params.period.as_deref())
        .await;
    Ok(table_response(result))
}

pub async fn get_nav(
    manager: web::Data<DataSourceManager>,
    path: web::Path<String>,
    params: web::Query<NavParams>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let result = query(manager, params.source)
        .query_fund_nav(&code, params.start_date.as_deref(), params.end_date.as_deref())
        .await;
    Ok(table_response(result))
}

pub async fn get_rank(
    manager: web::Data<DataSourceManager>,
    params: web::Query<RankParams>,
) -> Result<HttpResponse> {
    let result = query(manager, params.source)
        .query_fund_rank(&params.fund_type, &params.sort_by, params.top_n)
        .await;
    Ok(table_response(result))
}

pub async fn get_industry_allocation(
    manager: web::Data<DataSourceManager>,
    params: web::Query<IndustryParams>,
) -> Result<HttpResponse> {
    let Some(date) = params.date.as_deref() else {
        return Ok(table_response(Err(DataSourceError::InvalidRequest(
            "缺少参数 date（YYYYMMDD）".to_string(),
        ))));
    };
    let result = query(manager, params.source)
        .query_fund_industry_allocation(date)
        .await;
    Ok(table_response(result))
}

pub async fn compare_funds(
    manager: web::Data<DataSourceManager>,
    params: web::Query<CompareParams>,
) -> Result<HttpResponse> {
    let codes = split_list(&params.codes);
    if codes.len() < 2 {
        return Ok(table_response(Err(DataSourceError::InvalidRequest(
            "至少需要两只基金代码".to_string(),
        ))));
    }
    let table = query(manager, params.source)
        .compare_fund_holdings(&codes, params.period.as_deref())
        .await;
    Ok(table_response(Ok(table)))
}

pub async fn list_funds(
    manager: web::Data<DataSourceManager>,
    params: web::Query<HoldingsParams>,
) -> Result<HttpResponse> {
    let result = query(manager, params.source).query_fund_basic().await;
    Ok(table_response(result))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/funds")
            .route("/basic", web::get().to(list_funds))
            .route("/rank", web::get().to(get_rank))
            .route("/industry", web::get().to(get_industry_allocation))
            .route("/compare", web::get().to(compare_funds))
            .route("/{code}/holdings", web::get().to(get_holdings))
            .route("/{code}/nav", web::get().to(get_nav)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::datasource::manager::mock::{table, MockDataSource};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn manager() -> web::Data<DataSourceManager> {
        let config = AppConfig {
            default_source: "akshare".to_string(),
            fallback_sources: Vec::new(),
            ..AppConfig::default()
        };
        let rank = crate::models::table::DataTable::from_rows(
            ["基金代码", "基金简称", "近1年"],
            vec![
                vec![json!("000001"), json!("成长A"), json!(40.0)],
                vec![json!("000002"), json!("价值A"), json!(30.0)],
            ],
        );
        let manager = DataSourceManager::new(config);
        manager
            .register(Arc::new(
                MockDataSource::new(DataSourceType::Akshare)
                    .with_table("rank:全部:近1年", rank)
                    .with_table(
                        "holdings:000001",
                        table(&["股票代码", "股票名称"], vec![json!("600519"), json!("贵州茅台")]),
                    )
                    .with_table(
                        "holdings:000002",
                        table(&["股票代码", "股票名称"], vec![json!("600519"), json!("贵州茅台")]),
                    ),
            ))
            .await;
        web::Data::new(manager)
    }

    #[actix_web::test]
    async fn test_rank_defaults() {
        let app = test::init_service(App::new().app_data(manager().await).configure(config)).await;

        let req = test::TestRequest::get().uri("/funds/rank?top_n=1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));
        assert_eq!(body["data"][0]["基金代码"], json!("000001"));
    }

    #[actix_web::test]
    async fn test_holdings_route() {
        let app = test::init_service(App::new().app_data(manager().await).configure(config)).await;

        let req = test::TestRequest::get()
            .uri("/funds/000001/holdings?period=2024Q2")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"][0]["股票名称"], json!("贵州茅台"));
    }

    #[actix_web::test]
    async fn test_industry_requires_date() {
        let app = test::init_service(App::new().app_data(manager().await).configure(config)).await;

        let req = test::TestRequest::get().uri("/funds/industry").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_compare_route() {
        let app = test::init_service(App::new().app_data(manager().await).configure(config)).await;

        let req = test::TestRequest::get()
            .uri("/funds/compare?codes=000001,000002")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(body["data"][1]["共同持仓数"], json!(1));

        let req = test::TestRequest::get().uri("/funds/compare?codes=000001").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

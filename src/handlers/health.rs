use actix_web::{web, HttpResponse, Result};
use serde::Serialize;

use crate::datasource::DataSourceManager;
use crate::models::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct HealthInfo {
    pub status: &'static str,
    pub version: &'static str,
    pub default_source: String,
}

/// 健康检查，免认证
pub async fn health_check(manager: web::Data<DataSourceManager>) -> Result<HttpResponse> {
    let info = HealthInfo {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        default_source: manager.default_source().await.to_string(),
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(info).with_message("Service is healthy")))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}

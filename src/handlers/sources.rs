use actix_web::{web, HttpResponse, Result};

use crate::datasource::DataSourceManager;
use crate::models::response::ApiResponse;

/// 各数据源的可用、连接和默认状态
pub async fn list_sources(manager: web::Data<DataSourceManager>) -> Result<HttpResponse> {
    let status = manager.status().await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(status)))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/sources", web::get().to(list_sources));
}

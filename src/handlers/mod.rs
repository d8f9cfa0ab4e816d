pub mod funds;
pub mod health;
pub mod sources;
pub mod stocks;

use actix_web::{web, HttpResponse};
use serde_json::{Map, Value};

use crate::error::{DataResult, DataSourceError};
use crate::models::response::ApiResponse;
use crate::models::table::DataTable;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(health::config)
            .configure(sources::config)
            .configure(stocks::config)
            .configure(funds::config),
    );
}

/// 查询结果转为 JSON 记录数组
pub(crate) fn table_response(result: DataResult<DataTable>) -> HttpResponse {
    match result {
        Ok(table) => {
            let message = format!("共 {} 条记录", table.len());
            HttpResponse::Ok().json(ApiResponse::success(table.to_records()).with_message(message))
        }
        Err(e) => {
            log::warn!("查询失败: {}", e);
            let response = ApiResponse::<Vec<Map<String, Value>>>::error(e.to_string());
            match e {
                DataSourceError::InvalidRequest(_) => HttpResponse::BadRequest().json(response),
                _ => HttpResponse::InternalServerError().json(response),
            }
        }
    }
}

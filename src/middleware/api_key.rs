//! API Key 认证中间件
//!
//! 通过 Header 中的 Authorization: Bearer <token> 进行认证，
//! 健康检查接口免认证；未配置 API Key 时不做认证

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
    body::EitherBody,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::models::response::ApiResponse;

/// 免认证的路径后缀
const EXEMPT_SUFFIXES: [&str; 1] = ["/health"];

fn is_exempt(path: &str) -> bool {
    EXEMPT_SUFFIXES.iter().any(|s| path.ends_with(s))
}

/// 校验 `Authorization` 头
fn is_authorized(header: Option<&str>, api_key: &str) -> bool {
    if api_key.is_empty() {
        return true;
    }
    header
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim() == api_key)
        .unwrap_or(false)
}

/// API Key 中间件
pub struct ApiKeyMiddleware {
    api_key: Rc<String>,
}

impl ApiKeyMiddleware {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key: Rc::new(api_key),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ApiKeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiKeyMiddlewareService {
            service: Rc::new(service),
            api_key: self.api_key.clone(),
        })
    }
}

pub struct ApiKeyMiddlewareService<S> {
    service: Rc<S>,
    api_key: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let api_key = self.api_key.clone();

        Box::pin(async move {
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok());

            if is_exempt(req.path()) || is_authorized(header, api_key.as_str()) {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            log::warn!("拒绝未认证的请求: {}", req.path());
            let response = HttpResponse::Unauthorized()
                .json(ApiResponse::<()>::error("无效的 Bearer Token".to_string()));
            Ok(req.into_response(response).map_into_right_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as atest, web, App};

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[test]
    fn test_is_authorized() {
        assert!(is_authorized(Some("Bearer secret"), "secret"));
        assert!(!is_authorized(Some("Bearer wrong"), "secret"));
        assert!(!is_authorized(Some("secret"), "secret"));
        assert!(!is_authorized(None, "secret"));
        // 未配置 API Key
        assert!(is_authorized(None, ""));
    }

    #[actix_web::test]
    async fn test_middleware_rejects_and_exempts() {
        let app = atest::init_service(
            App::new()
                .wrap(ApiKeyMiddleware::new("secret".to_string()))
                .route("/api/v1/health", web::get().to(ok))
                .route("/api/v1/sources", web::get().to(ok)),
        )
        .await;

        let req = atest::TestRequest::get().uri("/api/v1/health").to_request();
        assert_eq!(atest::call_service(&app, req).await.status(), StatusCode::OK);

        let req = atest::TestRequest::get().uri("/api/v1/sources").to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = atest::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "无效的 Bearer Token");
        assert!(body["data"].is_null());
        assert!(body["timestamp"].is_string());

        let req = atest::TestRequest::get()
            .uri("/api/v1/sources")
            .insert_header(("Authorization", "Bearer secret"))
            .to_request();
        assert_eq!(atest::call_service(&app, req).await.status(), StatusCode::OK);
    }
}

//! HTTP surface of the token exchange service.

pub mod token;

use axum::http::{header, HeaderValue, Method};
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::oauth::TokenExchangeService;

/// Shared, immutable handler state.
#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<TokenExchangeService>,
}

/// CORS policy for the public client origin. `*` allows any origin.
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, String> {
    let origin = if allowed_origin == "*" {
        AllowOrigin::any()
    } else {
        let value = HeaderValue::from_str(allowed_origin)
            .map_err(|e| format!("invalid allowed origin '{allowed_origin}': {e}"))?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

/// OPTIONS never reaches the handlers: the CORS layer answers it.
pub fn router(exchange: TokenExchangeService, cors: CorsLayer) -> Router {
    let state = AppState {
        exchange: Arc::new(exchange),
    };

    Router::new()
        .route(
            "/exchange_token",
            post(token::exchange_token)
                .get(token::status)
                .fallback(token::method_not_allowed),
        )
        .route(
            "/refresh_token",
            post(token::refresh_token)
                .get(token::status)
                .fallback(token::method_not_allowed),
        )
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(token_url: &str) -> ProviderConfig {
        ProviderConfig {
            authorize_url: "https://accounts.example.com/authorize".to_string(),
            token_url: token_url.to_string(),
            client_id: "client-123".to_string(),
            client_secret: "s3cret".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            scopes: Vec::new(),
            refresh_requires_secret: false,
        }
    }

    fn app(provider: ProviderConfig) -> Router {
        let svc = TokenExchangeService::new(reqwest::Client::new(), provider);
        router(svc, cors_layer("*").unwrap())
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_exchange_token_relays_provider_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "scope": "user-read-email",
            })))
            .mount(&server)
            .await;

        let res = app(provider(&format!("{}/api/token", server.uri())))
            .oneshot(post_json(
                "/exchange_token",
                json!({ "code": "abc", "code_verifier": "v" }),
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["access_token"], "at");
        assert_eq!(body["scope"], "user-read-email");
    }

    #[tokio::test]
    async fn test_form_body_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let req = Request::builder()
            .method("POST")
            .uri("/refresh_token")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("refresh_token=abc"))
            .unwrap();
        let res = app(provider(&format!("{}/api/token", server.uri())))
            .oneshot(req)
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["access_token"], "new");
        assert!(body.get("refresh_token").is_none());
    }

    #[tokio::test]
    async fn test_missing_fields_rejected_with_400() {
        let res = app(provider("http://127.0.0.1:9/api/token"))
            .oneshot(post_json("/exchange_token", json!({ "code": "abc" })))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["error"], "Missing code or code_verifier");
    }

    #[tokio::test]
    async fn test_missing_credentials_returns_500() {
        let mut cfg = provider("http://127.0.0.1:9/api/token");
        cfg.client_secret = String::new();
        let res = app(cfg)
            .oneshot(post_json(
                "/exchange_token",
                json!({ "code": "abc", "code_verifier": "v" }),
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(res).await;
        assert_eq!(body["error"], "Missing provider client credentials");
    }

    #[tokio::test]
    async fn test_provider_rejection_maps_to_400_with_details() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let res = app(provider(&format!("{}/api/token", server.uri())))
            .oneshot(post_json(
                "/exchange_token",
                json!({ "code": "used", "code_verifier": "v" }),
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["error"], "Failed to exchange token");
        assert_eq!(body["details"]["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let req = Request::builder()
            .method("POST")
            .uri("/refresh_token")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app(provider("http://127.0.0.1:9/api/token"))
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_preflight_returns_cors_headers() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/exchange_token")
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();
        let res = app(provider("http://127.0.0.1:9/api/token"))
            .oneshot(req)
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
        let methods = res.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("POST"));
        assert!(methods.contains("OPTIONS"));
    }

    #[tokio::test]
    async fn test_options_without_origin_answered_by_cors_layer() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/refresh_token")
            .body(Body::empty())
            .unwrap();
        let res = app(provider("http://127.0.0.1:9/api/token"))
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()["access-control-allow-methods"],
            "GET,POST,OPTIONS"
        );
    }

    #[tokio::test]
    async fn test_exact_origin_cors() {
        let svc = TokenExchangeService::new(
            reqwest::Client::new(),
            provider("http://127.0.0.1:9/api/token"),
        );
        let app = router(svc, cors_layer("https://app.example.com").unwrap());
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/exchange_token")
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(
            res.headers()["access-control-allow-origin"],
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn test_get_reports_status_without_secrets() {
        let req = Request::builder()
            .method("GET")
            .uri("/exchange_token")
            .body(Body::empty())
            .unwrap();
        let res = app(provider("http://127.0.0.1:9/api/token"))
            .oneshot(req)
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["message"], "exchange_token endpoint is working");
        assert_eq!(body["env_status"]["has_client_id"], true);
        assert_eq!(body["env_status"]["has_client_secret"], true);
        assert!(!body.to_string().contains("s3cret"));
    }

    #[tokio::test]
    async fn test_other_methods_return_405_json() {
        let req = Request::builder()
            .method("DELETE")
            .uri("/refresh_token")
            .body(Body::empty())
            .unwrap();
        let res = app(provider("http://127.0.0.1:9/api/token"))
            .oneshot(req)
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = json_body(res).await;
        assert_eq!(body["error"], "Method not allowed");
    }

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(cors_layer("https://bad\norigin").is_err());
    }
}

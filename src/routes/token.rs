use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;

use super::AppState;
use crate::oauth::token::now_secs;
use crate::oauth::ExchangeError;

/// Body of `POST /exchange_token`.
#[derive(Deserialize)]
pub struct ExchangeTokenBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub code_verifier: String,
}

impl fmt::Debug for ExchangeTokenBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeTokenBody")
            .field("has_code", &!self.code.is_empty())
            .field("has_code_verifier", &!self.code_verifier.is_empty())
            .finish()
    }
}

/// Body of `POST /refresh_token`.
#[derive(Deserialize)]
pub struct RefreshTokenBody {
    #[serde(default)]
    pub refresh_token: String,
}

impl fmt::Debug for RefreshTokenBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenBody")
            .field("has_refresh_token", &!self.refresh_token.is_empty())
            .finish()
    }
}

/// Accepts either a JSON or an `application/x-www-form-urlencoded` body,
/// chosen by `Content-Type`.
pub struct GrantBody<T>(pub T);

impl<S, T> FromRequest<S> for GrantBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ExchangeError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| ExchangeError::InvalidRequest(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| ExchangeError::InvalidRequest(e.body_text()))?;
            Ok(Self(value))
        }
    }
}

/// POST /exchange_token: authorization code + verifier for tokens
pub async fn exchange_token(
    State(state): State<AppState>,
    GrantBody(body): GrantBody<ExchangeTokenBody>,
) -> Result<Json<Value>, ExchangeError> {
    let tokens = state
        .exchange
        .exchange_code(&body.code, &body.code_verifier)
        .await?;
    Ok(Json(tokens))
}

/// POST /refresh_token: refresh token for a new access token
pub async fn refresh_token(
    State(state): State<AppState>,
    GrantBody(body): GrantBody<RefreshTokenBody>,
) -> Result<Json<Value>, ExchangeError> {
    let tokens = state.exchange.refresh(&body.refresh_token).await?;
    Ok(Json(tokens))
}

/// GET on either endpoint. Liveness plus credential presence (never values)
pub async fn status(State(state): State<AppState>, uri: Uri) -> Json<Value> {
    let provider = state.exchange.provider();
    Json(json!({
        "message": format!("{} endpoint is working", uri.path().trim_start_matches('/')),
        "method": "GET",
        "timestamp": now_secs(),
        "env_status": {
            "has_client_id": provider.has_client_id(),
            "has_client_secret": provider.has_client_secret(),
        },
    }))
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_debug_hides_grant_material() {
        let body: ExchangeTokenBody =
            serde_json::from_str(r#"{"code":"the-code","code_verifier":"the-verifier"}"#).unwrap();
        let shown = format!("{body:?}");
        assert!(shown.contains("has_code_verifier: true"));
        assert!(!shown.contains("the-code"));
        assert!(!shown.contains("the-verifier"));

        let body: RefreshTokenBody = serde_json::from_str(r#"{"refresh_token":"rt-1"}"#).unwrap();
        let shown = format!("{body:?}");
        assert!(shown.contains("has_refresh_token: true"));
        assert!(!shown.contains("rt-1"));
    }
}

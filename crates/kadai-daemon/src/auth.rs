//! Request identity: the anonymous customer id and the admin bearer session.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, state::AppState};

pub const CUSTOMER_HEADER: &str = "x-kadai-user";

/// Anonymous customer id from the `x-kadai-user` header.
#[derive(Debug, Clone)]
pub struct CustomerId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CustomerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CUSTOMER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        if raw.is_empty() || raw.len() > 128 {
            return Err(ApiError::BadRequest(format!(
                "missing or invalid {CUSTOMER_HEADER} header; POST /v1/session first"
            )));
        }
        Ok(CustomerId(raw.to_string()))
    }
}

/// A verified admin session.
///
/// The token comes from `Authorization: Bearer <token>`, or from a `token`
/// query parameter for SSE clients that cannot set headers.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub session_id: String,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        st: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| query_token(parts))
            .ok_or_else(|| ApiError::Unauthorized("admin login required".to_string()))?;
        match st.admin.verify(&token).await {
            Some(session_id) => Ok(AdminSession { session_id, token }),
            None => Err(ApiError::Unauthorized(
                "admin session expired or revoked".to_string(),
            )),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn query_token(parts: &Parts) -> Option<String> {
    parts
        .uri
        .query()?
        .split('&')
        .find_map(|kv| kv.strip_prefix("token="))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

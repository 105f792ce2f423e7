use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use db::models::Tier;
use focustube_core::auth::hash_api_key;

use crate::{
    error::{ApiError, AppError},
    state::{AppState, RequestId},
};

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub key_id: String,
    pub user_id: String,
    pub tier: Tier,
}

pub async fn api_key_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId("unknown".to_string()));
    let unauthorized = |msg: &str| request_id.error(AppError::Unauthorized(msg.to_string()));

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("missing authorization header"))?;

    let token = parse_bearer(header_value).ok_or_else(|| unauthorized("invalid authorization header"))?;
    let hash = hash_api_key(token);

    let owner = db::queries::api_keys::find_owner(&state.db, &hash)
        .await
        .map_err(|e| request_id.internal(e))?
        .ok_or_else(|| unauthorized("invalid api key"))?;

    if let Some(expires_at) = owner.expires_at {
        if expires_at < chrono::Utc::now() {
            return Err(unauthorized("api key expired"));
        }
    }

    if let Err(e) = db::queries::api_keys::touch_last_used(&state.db, &owner.key_id).await {
        tracing::warn!(request_id = %request_id.0, key_id = %owner.key_id, error = %e, "Failed to record key use");
    }

    req.extensions_mut().insert(AuthContext {
        key_id: owner.key_id,
        user_id: owner.user_id,
        tier: owner.tier,
    });

    Ok(next.run(req).await)
}

fn parse_bearer(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        let value = HeaderValue::from_static("Bearer ftk_abc");
        assert_eq!(parse_bearer(&value), Some("ftk_abc"));

        let value = HeaderValue::from_static("bearer  ftk_abc ");
        assert_eq!(parse_bearer(&value), Some("ftk_abc"));
    }

    #[test]
    fn test_parse_bearer_rejects_other_schemes() {
        assert_eq!(parse_bearer(&HeaderValue::from_static("Basic dXNlcjpwYXNz")), None);
        assert_eq!(parse_bearer(&HeaderValue::from_static("Bearer ")), None);
        assert_eq!(parse_bearer(&HeaderValue::from_static("ftk_abc")), None);
    }
}

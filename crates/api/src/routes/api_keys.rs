use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use db::models::{ApiKey, ApiKeyStatus};
use focustube_core::auth::generate_api_key;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiResult, AppError},
    extract::ApiJson,
    middleware::auth::AuthContext,
    state::{AppState, RequestId},
};

const MAX_NAME_CHARS: usize = 100;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/api-keys", get(list_keys).post(create_key))
        .route("/v1/api-keys/{id}", delete(revoke_key))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct CreateKeyRequest {
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyResponse {
    id: String,
    key_prefix: String,
    name: Option<String>,
    status: ApiKeyStatus,
    last_used_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            key_prefix: key.key_prefix,
            name: key.name,
            status: key.status,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
            created_at: key.created_at,
        }
    }
}

/// Carries the raw key; it is never retrievable again.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedKeyResponse {
    key: String,
    #[serde(flatten)]
    details: ApiKeyResponse,
}

#[derive(Debug, Serialize)]
struct ApiKeyListResponse {
    items: Vec<ApiKeyResponse>,
}

async fn list_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<ApiKeyListResponse>> {
    let keys = db::queries::api_keys::list_by_user(&state.db, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;

    Ok(Json(ApiKeyListResponse {
        items: keys.into_iter().map(ApiKeyResponse::from).collect(),
    }))
}

async fn create_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(payload): ApiJson<CreateKeyRequest>,
) -> ApiResult<(StatusCode, Json<CreatedKeyResponse>)> {
    let name = payload
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    if name
        .as_ref()
        .is_some_and(|name| name.chars().count() > MAX_NAME_CHARS)
    {
        return Err(request_id.error(AppError::BadRequest(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        ))));
    }

    let (raw, hash, prefix) = generate_api_key();
    let id = format!("key_{}", nanoid::nanoid!(12));

    let key = db::queries::api_keys::create(
        &state.db,
        &id,
        &hash,
        &prefix,
        &auth.user_id,
        name.as_deref(),
    )
    .await
    .map_err(|e| request_id.internal(e))?;

    tracing::info!(request_id = %request_id.0, user_id = %auth.user_id, key_id = %key.id, "API key created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedKeyResponse {
            key: raw,
            details: key.into(),
        }),
    ))
}

async fn revoke_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let revoked = db::queries::api_keys::revoke(&state.db, &id, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;
    if !revoked {
        return Err(request_id.error(AppError::NotFound("api key not found".to_string())));
    }

    tracing::info!(
        request_id = %request_id.0,
        user_id = %auth.user_id,
        key_id = %id,
        self_revoked = id == auth.key_id,
        "API key revoked"
    );
    Ok(StatusCode::NO_CONTENT)
}

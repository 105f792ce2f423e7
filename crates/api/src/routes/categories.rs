use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use db::models::Category;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiResult, AppError},
    extract::ApiJson,
    middleware::auth::AuthContext,
    state::{AppState, RequestId},
};

const MAX_NAME_CHARS: usize = 50;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/categories", get(list_categories).post(create_category))
        .route(
            "/v1/categories/{id}",
            patch(update_category).delete(delete_category),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCategoryRequest {
    name: String,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCategoryRequest {
    name: Option<String>,
    color: Option<String>,
    position: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryResponse {
    id: String,
    name: String,
    color: Option<String>,
    position: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            color: category.color,
            position: category.position,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct CategoryListResponse {
    items: Vec<CategoryResponse>,
}

fn validate_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    let chars = name.chars().count();
    if chars == 0 || chars > MAX_NAME_CHARS {
        return Err(format!("name must be 1 to {MAX_NAME_CHARS} characters"));
    }
    Ok(name.to_string())
}

/// `#rrggbb`.
fn validate_color(color: &str) -> Result<String, String> {
    let hex = color.strip_prefix('#').unwrap_or_default();
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("color must look like #1a2b3c".to_string());
    }
    Ok(color.to_ascii_lowercase())
}

async fn list_categories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<CategoryListResponse>> {
    let categories = db::queries::categories::list(&state.db, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;

    Ok(Json(CategoryListResponse {
        items: categories.into_iter().map(CategoryResponse::from).collect(),
    }))
}

async fn create_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(payload): ApiJson<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<CategoryResponse>)> {
    let bad_request = |msg: String| request_id.error(AppError::BadRequest(msg));
    let name = validate_name(&payload.name).map_err(bad_request)?;
    let color = payload
        .color
        .as_deref()
        .map(validate_color)
        .transpose()
        .map_err(bad_request)?;

    let id = format!("cat_{}", nanoid::nanoid!(12));
    let category =
        db::queries::categories::create(&state.db, &id, &auth.user_id, &name, color.as_deref())
            .await
            .map_err(|e| {
                if db::is_unique_violation(&e) {
                    request_id.error(AppError::BadRequest(format!(
                        "a category named {name:?} already exists"
                    )))
                } else {
                    request_id.internal(e)
                }
            })?;

    Ok((StatusCode::CREATED, Json(category.into())))
}

async fn update_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateCategoryRequest>,
) -> ApiResult<Json<CategoryResponse>> {
    let bad_request = |msg: String| request_id.error(AppError::BadRequest(msg));

    if payload.name.is_none() && payload.color.is_none() && payload.position.is_none() {
        return Err(bad_request("no fields to update".to_string()));
    }
    let name = payload
        .name
        .as_deref()
        .map(validate_name)
        .transpose()
        .map_err(bad_request)?;
    let color = payload
        .color
        .as_deref()
        .map(validate_color)
        .transpose()
        .map_err(bad_request)?;
    if payload.position.is_some_and(|position| position < 0) {
        return Err(bad_request("position must not be negative".to_string()));
    }

    let category = db::queries::categories::update(
        &state.db,
        &id,
        &auth.user_id,
        name.as_deref(),
        color.as_deref(),
        payload.position,
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            request_id.error(AppError::BadRequest(
                "a category with that name already exists".to_string(),
            ))
        } else {
            request_id.internal(e)
        }
    })?
    .ok_or_else(|| request_id.error(AppError::NotFound("category not found".to_string())))?;

    Ok(Json(category.into()))
}

async fn delete_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let deleted = db::queries::categories::delete(&state.db, &id, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;
    if !deleted {
        return Err(request_id.error(AppError::NotFound("category not found".to_string())));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Science  ").unwrap(), "Science");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(51)).is_err());
        // Length counts characters, not bytes.
        assert!(validate_name(&"é".repeat(50)).is_ok());
    }

    #[test]
    fn test_validate_color() {
        assert_eq!(validate_color("#1A2B3C").unwrap(), "#1a2b3c");
        assert!(validate_color("1a2b3c").is_err());
        assert!(validate_color("#1a2b3").is_err());
        assert!(validate_color("#zzzzzz").is_err());
    }
}

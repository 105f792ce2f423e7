use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

use crate::{
    error::{ApiError, AppError},
    state::RequestId,
};

/// `Json` whose rejections use the API error body instead of axum's plain text.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| "unknown".to_string());

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                Err(AppError::BadRequest(rejection.body_text()).with_request_id(&request_id))
            }
        }
    }
}

pub mod api_keys;
pub mod billing;
pub mod categories;
pub mod channels;
pub mod feed;
pub mod health;
pub mod me;
pub mod watch;

use axum::Router;

use crate::state::AppState;

/// Authenticated extension/app surface. Auth and rate limiting are layered on
/// by the caller.
pub fn v1_router(state: AppState) -> Router {
    Router::new()
        .merge(me::router(state.clone()))
        .merge(channels::router(state.clone()))
        .merge(categories::router(state.clone()))
        .merge(feed::router(state.clone()))
        .merge(watch::router(state.clone()))
        .merge(billing::router(state.clone()))
        .merge(api_keys::router(state))
}

/// Signed provider callbacks; no API-key auth.
pub fn webhook_router(state: AppState) -> Router {
    billing::webhook_router(state)
}

pub fn health_router(state: AppState) -> Router {
    health::router(state)
}

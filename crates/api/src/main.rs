use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use feed::YouTubeClient;
use focustube_core::config::Settings;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

mod error;
mod extract;
mod middleware;
mod payments;
mod routes;
mod state;

use crate::middleware::{auth::api_key_auth, rate_limit::rate_limit, request_id::request_id};
use crate::payments::PaymentsClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await?;
    db::migrate(&db).await?;

    let redis = redis::Client::open(settings.redis_url.as_str())?;
    let youtube = YouTubeClient::new(&settings.youtube_api_url, &settings.youtube_api_key)?;
    let payments = PaymentsClient::new(&settings.billing_api_url, &settings.billing_api_token)?;

    let cors = cors_layer(&settings.cors_origins);
    let addr: SocketAddr = settings.api_bind.parse()?;

    let state = AppState {
        db,
        redis,
        settings: Arc::new(settings),
        youtube,
        payments,
    };

    // Layers run bottom-up: request id, then auth, then rate limiting.
    let v1 = routes::v1_router(state.clone())
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn_with_state(state.clone(), api_key_auth))
        .layer(from_fn(request_id));

    let webhooks = routes::webhook_router(state.clone()).layer(from_fn(request_id));

    let app = Router::new()
        .merge(routes::health_router(state.clone()))
        .merge(webhooks)
        .merge(v1)
        .layer(cors);

    info!(%addr, env = %state.settings.focustube_env, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Any origin when none are configured; the extension's origin is not known
/// until it is published.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::HeaderName::from_static("x-request-id")])
}

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use db::models::Tier;
use focustube_core::config::Settings;

use crate::{
    error::{ApiError, AppError},
    middleware::auth::AuthContext,
    state::{AppState, RequestId},
};

/// Token bucket per API key: `capacity` requests, refilled at `capacity`
/// per minute.
const TOKEN_BUCKET: &str = r#"
local bucket = KEYS[1]
local now = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local refill = tonumber(ARGV[3])

local data = redis.call('HMGET', bucket, 'tokens', 'ts')
local tokens = tonumber(data[1]) or capacity
local ts = tonumber(data[2]) or now

local delta = math.max(0, now - ts)
local available = math.min(capacity, tokens + (delta * refill / 60))
local allowed = 0
if available >= 1 then
  available = available - 1
  allowed = 1
end

redis.call('HSET', bucket, 'tokens', available, 'ts', now)
redis.call('EXPIRE', bucket, 120)
return allowed
"#;

pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId("unknown".to_string()));
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| request_id.error(AppError::Unauthorized("missing credentials".to_string())))?;

    let capacity = capacity_for(&state.settings, auth.tier);

    let mut conn = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| request_id.internal(e))?;

    let allowed = allow_request(&mut conn, &auth.key_id, capacity)
        .await
        .map_err(|e| request_id.internal(e))?;

    if !allowed {
        tracing::debug!(request_id = %request_id.0, user_id = %auth.user_id, "Rate limited");
        return Err(request_id.error(AppError::RateLimited));
    }

    Ok(next.run(req).await)
}

fn capacity_for(settings: &Settings, tier: Tier) -> u32 {
    match tier {
        Tier::Free => settings.rate_limit_free,
        Tier::Pro => settings.rate_limit_pro,
        Tier::Unlimited => settings.rate_limit_unlimited,
    }
}

async fn allow_request(
    conn: &mut redis::aio::MultiplexedConnection,
    key_id: &str,
    capacity: u32,
) -> redis::RedisResult<bool> {
    let now = chrono::Utc::now().timestamp();

    let allowed: i32 = redis::Script::new(TOKEN_BUCKET)
        .key(format!("rl:{key_id}"))
        .arg(now)
        .arg(capacity)
        .arg(capacity)
        .invoke_async(conn)
        .await?;

    Ok(allowed == 1)
}

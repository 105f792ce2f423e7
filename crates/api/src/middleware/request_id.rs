use axum::{body::Body, http::Request, middleware::Next, response::Response};
use nanoid::nanoid;

use crate::state::RequestId;

const HEADER: &str = "x-request-id";
const MAX_INBOUND_LEN: usize = 64;

/// Tag every request with an id, reusing a well-formed one sent by the
/// extension so both sides log the same value.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| is_acceptable(value))
        .map(str::to_string)
        .unwrap_or_else(|| format!("req_{}", nanoid!(16)));

    req.extensions_mut().insert(RequestId(request_id.clone()));
    let mut resp = next.run(req).await;
    if let Ok(value) = request_id.parse() {
        resp.headers_mut().insert(HEADER, value);
    }
    resp
}

fn is_acceptable(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_INBOUND_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_ids_are_filtered() {
        assert!(is_acceptable("req_abc-123"));
        assert!(!is_acceptable(""));
        assert!(!is_acceptable("req abc"));
        assert!(!is_acceptable("req\n"));
        assert!(!is_acceptable(&"a".repeat(65)));
    }
}

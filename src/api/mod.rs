//! HTTP routing and dispatch.
//!
//! Every API route is registered with `any()` and performs its own ordered
//! guard chain (authentication, role, content negotiation, method), so the
//! 401/403/404/405/406 precedence is explicit in code rather than implied
//! by framework routing. By-id routes additionally gate on the document id
//! shape before anything else; a malformed id is just an unknown path.

pub mod auth;
pub mod error;
mod orders;
mod products;
mod users;
pub mod validation;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

use error::ApiError;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/register", any(users::register_collection))
        .route("/api/users", any(users::collection))
        .route("/api/users/:id", any(users::by_id))
        .route("/api/products", any(products::collection))
        .route("/api/products/:id", any(products::by_id))
        .route("/api/orders", any(orders::collection))
        .route("/api/orders/:id", any(orders::by_id))
        // Unknown API paths are 404 for every method
        .route("/api/*rest", any(not_found))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

/// Does the client declare that it accepts JSON responses?
///
/// True iff the Accept header is present and at least one media range
/// contains `application/json` or is the `*/*` wildcard. No header means no.
pub fn accepts_json(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    accept.split(',').any(|entry| {
        let entry = entry.trim();
        entry.contains("application/json") || entry.starts_with("*/*")
    })
}

/// Parse a request body as a JSON document.
pub(crate) fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid request body"))
}

/// Respond to a CORS preflight for a collection route.
fn preflight(allowed: &[Method]) -> Response {
    let methods = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(",");

    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Methods", methods)
        .header("Access-Control-Allow-Headers", "Content-Type,Accept")
        .header("Access-Control-Max-Age", "86400")
        .header("Access-Control-Expose-Headers", "Content-Type,Accept")
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::NO_CONTENT.into_response())
}

/// Shared entry checks for collection routes, in fixed order: OPTIONS
/// preflight, content negotiation (406), method allow-list (405).
///
/// `Ok(Some(response))` short-circuits with the preflight answer;
/// `Ok(None)` means the request may proceed to the handler.
pub(crate) fn collection_guards(
    method: &Method,
    headers: &HeaderMap,
    allowed: &[Method],
) -> Result<Option<Response>, ApiError> {
    if method == Method::OPTIONS {
        return Ok(Some(preflight(allowed)));
    }
    if !accepts_json(headers) {
        return Err(ApiError::not_acceptable());
    }
    if !allowed.contains(method) {
        return Err(ApiError::method_not_allowed());
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, value.parse().unwrap());
        headers
    }

    #[test]
    fn accepts_json_with_exact_type() {
        assert!(accepts_json(&accept("application/json")));
    }

    #[test]
    fn accepts_json_with_wildcard() {
        assert!(accepts_json(&accept("*/*")));
        assert!(accepts_json(&accept("text/html, */*;q=0.8")));
    }

    #[test]
    fn accepts_json_in_a_list() {
        assert!(accepts_json(&accept(
            "text/html,application/json;q=0.9,image/webp"
        )));
    }

    #[test]
    fn rejects_without_accept_header() {
        assert!(!accepts_json(&HeaderMap::new()));
    }

    #[test]
    fn rejects_non_json_accept() {
        assert!(!accepts_json(&accept("text/html")));
        assert!(!accepts_json(&accept("application/xml, text/plain")));
    }

    #[test]
    fn preflight_lists_allowed_methods() {
        let response = preflight(&[Method::GET, Method::POST]);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response
                .headers()
                .get("Access-Control-Allow-Methods")
                .unwrap(),
            "GET,POST"
        );
        assert_eq!(
            response.headers().get("Access-Control-Max-Age").unwrap(),
            "86400"
        );
    }

    #[test]
    fn guards_reject_unlisted_method() {
        let headers = accept("application/json");
        let err = collection_guards(&Method::DELETE, &headers, &[Method::GET])
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn guards_check_accept_before_method() {
        // A bad method with a non-JSON Accept header is 406, not 405.
        let err = collection_guards(&Method::DELETE, &accept("text/html"), &[Method::GET])
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn options_short_circuits_everything() {
        // No Accept header at all, still a 204 preflight.
        let response = collection_guards(&Method::OPTIONS, &HeaderMap::new(), &[Method::POST])
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn parse_body_rejects_malformed_json() {
        let err = parse_body(&Bytes::from_static(b"{not json")).err().unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(parse_body(&Bytes::from_static(b"{\"a\":1}")).is_ok());
    }
}

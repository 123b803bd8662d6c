//! Attaches [`crate::rate_limit::RateLimiter`] in front of the `/api` tree.
//! Classifies the route group from the request path rather than
//! [`axum::extract::MatchedPath`], since this middleware runs outermost,
//! before the nested routers that would populate it.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::rate_limit::RouteGroup;
use crate::state::AppState;

fn route_group_for(path: &str) -> RouteGroup {
    if path.ends_with("/sse") {
        RouteGroup::Sse
    } else if path.starts_with("/api/pipeline") || path.contains("/benchmark/") || path.ends_with("/restart") {
        RouteGroup::PipelineControl
    } else {
        RouteGroup::Read
    }
}

fn caller_id(request: &Request) -> String {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("anonymous")
        .to_string()
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let group = route_group_for(request.uri().path());
    let user_id = caller_id(&request);
    if !state.rate_limiter.try_admit(&user_id, group) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }
    next.run(request).await
}

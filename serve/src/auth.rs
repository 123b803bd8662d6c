//! Bearer-token auth for session-scoped routes.
//!
//! Token verification against a real identity provider is out of scope here;
//! the bearer token's value *is* the opaque user id, matching how
//! [`pipeline::PipelineState::user_id`] is just an opaque string the rest of
//! the crate never interprets. A missing or malformed header is collapsed
//! into the same 404-shaped [`crate::error::ApiError::NotFoundOrForbidden`]
//! as a non-owner request, per SPEC_FULL.md's error taxonomy.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::NotFoundOrForbidden)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::NotFoundOrForbidden)?
            .trim();
        if token.is_empty() {
            return Err(ApiError::NotFoundOrForbidden);
        }
        Ok(AuthUser(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<AuthUser, ApiError> {
        let (mut parts, _) = req.into_parts();
        AuthUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn valid_bearer_token_is_the_user_id() {
        let req = Request::builder()
            .header("authorization", "Bearer u1")
            .body(())
            .unwrap();
        let AuthUser(user_id) = extract(req).await.unwrap();
        assert_eq!(user_id, "u1");
    }

    #[tokio::test]
    async fn missing_header_is_not_found_or_forbidden() {
        let req = Request::builder().body(()).unwrap();
        let err = extract(req).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFoundOrForbidden));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let req = Request::builder()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap();
        let err = extract(req).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFoundOrForbidden));
    }
}

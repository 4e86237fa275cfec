use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use crate::model::UserContext;

/// Axum extractor for UserContext from request headers
///
/// The authentication layer in front of this service sets:
/// - X-User-Id: the acting user
/// - X-User-Token: bearer token forwarded to the sibling directories
///
/// A request without X-User-Id yields an anonymous context; operations that need a user
/// reject it as forbidden.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let user_id = extract_header_value(headers, "x-user-id").unwrap_or_default();
        let token = extract_header_value(headers, "x-user-token");

        Ok(UserContext::with_token(user_id.trim(), token))
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> UserContext {
        let (mut parts, _) = request.into_parts();
        UserContext::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_user_context_extraction() {
        let request = Request::builder()
            .header("x-user-id", "teacher-1")
            .header("x-user-token", "abc")
            .body(())
            .unwrap();

        let ctx = extract(request).await;
        assert_eq!(ctx.user_id, "teacher-1");
        assert_eq!(ctx.token, Some("abc".to_string()));
    }

    #[tokio::test]
    async fn test_missing_user_is_anonymous() {
        let ctx = extract(Request::builder().body(()).unwrap()).await;
        assert!(ctx.is_anonymous());
        assert_eq!(ctx.token, None);
    }
}

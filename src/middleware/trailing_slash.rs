use crate::http::Request;
use crate::middleware::{Middleware, MiddlewareResult, Next};

/// Rewrites `/target/` to `/target` before routing. The root path is left alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoveTrailingSlash;

impl Middleware for RemoveTrailingSlash {
    fn call(&self, mut req: Request, next: Next) -> MiddlewareResult {
        if req.path.len() > 1 && req.path.ends_with('/') {
            let trimmed = req.path.trim_end_matches('/');
            req.path = if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() };
        }
        Box::pin(async move { next.handle(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::http::{Method, Response};

    async fn routed_path(uri: &str) -> String {
        let next = Next::new(|req: Request| async move {
            let mut response = Response::new(200);
            response.body(req.path);
            Ok::<_, ServerError>(response)
        });
        let response = RemoveTrailingSlash
            .call(Request::new(Method::GET, uri), next)
            .await
            .unwrap();
        response.body_string()
    }

    #[tokio::test]
    async fn strips_trailing_slash() {
        assert_eq!(routed_path("/target/").await, "/target");
        assert_eq!(routed_path("/target").await, "/target");
        assert_eq!(routed_path("/nested//").await, "/nested");
        assert_eq!(routed_path("/").await, "/");
    }
}

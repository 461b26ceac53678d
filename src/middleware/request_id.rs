use crate::http::Request;
use crate::middleware::{Middleware, MiddlewareResult, Next};
use tracing::info_span;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Tags every request with a fresh UUID v4.
///
/// The id lands in the request scope together with a `request` span that
/// carries it (child of the server span when one is configured), and is
/// echoed in the `X-Request-ID` response header.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestId;

impl Middleware for RequestId {
    fn call(&self, mut req: Request, next: Next) -> MiddlewareResult {
        let request_id = Uuid::new_v4().to_string();
        let span = match req.scope.server.as_ref().and_then(|s| s.logger.as_ref()) {
            Some(parent) => info_span!(parent: parent, "request", request_id = %request_id),
            None => info_span!("request", request_id = %request_id),
        };
        req.scope.attach_request_id(request_id.clone(), span);
        req.scope.set_response_header(REQUEST_ID_HEADER, &request_id);

        Box::pin(async move {
            next.handle(req).await.map(|mut response| {
                if response.get_header(REQUEST_ID_HEADER).is_none() {
                    response.header(REQUEST_ID_HEADER, &request_id);
                }
                response
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::http::{Method, Response};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn id_is_in_scope_and_header() {
        let seen = Arc::new(Mutex::new(None::<String>));
        let seen_inner = Arc::clone(&seen);
        let next = Next::new(move |req: Request| {
            let seen = Arc::clone(&seen_inner);
            async move {
                *seen.lock().unwrap() = req.scope().request_id().map(str::to_string);
                Ok::<_, ServerError>(Response::new(200))
            }
        });

        let response = RequestId
            .call(Request::new(Method::GET, "/target"), next)
            .await
            .unwrap();

        let id = seen.lock().unwrap().clone().expect("request id in scope");
        assert!(!id.is_empty());
        assert_eq!(response.get_header(REQUEST_ID_HEADER), Some(id.as_str()));
    }

    #[tokio::test]
    async fn ids_differ_between_requests() {
        let next = Next::new(|_req: Request| async { Ok::<_, ServerError>(Response::new(200)) });
        let a = RequestId.call(Request::new(Method::GET, "/"), next.clone()).await.unwrap();
        let b = RequestId.call(Request::new(Method::GET, "/"), next).await.unwrap();
        assert_ne!(a.get_header(REQUEST_ID_HEADER), b.get_header(REQUEST_ID_HEADER));
    }
}

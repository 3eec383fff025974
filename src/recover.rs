//! Panic recovery.
//!
//! [`RecoverLayer`] turns a panicking handler into a `500 Internal Server
//! Error` response and hands the panic to the request's pending log entry
//! through the [`PanicReporter`] extension. Install it *inside*
//! [`RequestLoggerLayer`](crate::RequestLoggerLayer) so the reporter is
//! present on the requests it sees:
//!
//! ```rust
//! use axum::{routing::get, Router};
//! use httplog::{MemoryLogger, RecoverLayer, RequestLoggerConfig, RequestLoggerLayer};
//! use tower::ServiceBuilder;
//!
//! # async fn hello() -> &'static str { "Hello" }
//! let app: Router = Router::new().route("/hello", get(hello)).layer(
//!     ServiceBuilder::new()
//!         .layer(RequestLoggerLayer::new(RequestLoggerConfig::default(), MemoryLogger::new()))
//!         .layer(RecoverLayer::new()),
//! );
//! ```

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::error;

use crate::types::PanicReporter;

/// Renders a panic payload the way `panic!` formatted it.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

fn recovered(reporter: Option<&PanicReporter>, payload: Box<dyn Any + Send>) -> Response {
    let value = panic_message(&*payload);
    let stack = Backtrace::force_capture().to_string();
    match reporter {
        Some(reporter) => reporter.report(value, stack),
        None => error!(panic = %value, stacktrace = %stack, "Recovered from handler panic"),
    }
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Tower layer that recovers from panics in the wrapped service.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverLayer;

impl RecoverLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RecoverLayer {
    type Service = RecoverService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoverService { inner }
    }
}

/// Service produced by [`RecoverLayer`].
#[derive(Debug, Clone)]
pub struct RecoverService<S> {
    inner: S,
}

impl<S> Service<Request> for RecoverService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let reporter = request.extensions().get::<PanicReporter>().cloned();

        let future = match panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(request))) {
            Ok(future) => future,
            Err(payload) => {
                let response = recovered(reporter.as_ref(), payload);
                return Box::pin(async move { Ok(response) });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Ok(recovered(reporter.as_ref(), payload)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");

        let payload: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        assert_eq!(panic_message(&*payload), "code 7");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "Box<dyn Any>");
    }

    #[tokio::test]
    async fn test_panic_in_future_is_reported() {
        let service = RecoverLayer::new().layer(service_fn(|_req: Request| async move {
            if true {
                panic!("boom");
            }
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        let reporter = PanicReporter::new();
        let mut request = Request::new(Body::empty());
        request.extensions_mut().insert(reporter.clone());

        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let record = reporter.get().unwrap();
        assert_eq!(record.value, "boom");
        assert!(!record.stack.is_empty());
    }

    #[tokio::test]
    async fn test_passthrough_without_panic() {
        let service = RecoverLayer::new().layer(service_fn(|_req: Request| async move {
            Ok::<_, Infallible>(StatusCode::ACCEPTED.into_response())
        }));

        let reporter = PanicReporter::new();
        let mut request = Request::new(Body::empty());
        request.extensions_mut().insert(reporter.clone());

        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(reporter.get().is_none());
    }

    #[tokio::test]
    async fn test_panic_without_reporter_still_recovers() {
        let service = RecoverLayer::new().layer(service_fn(|_req: Request| -> std::future::Ready<Result<Response, Infallible>> {
            panic!("synchronous")
        }));

        let response = service.oneshot(Request::new(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! # httplog
//!
//! Structured access logging middleware for Axum and Tower. Every request
//! produces exactly one log record once its response has been sent, with the
//! request and response described as nested structured fields.
//!
//! ## Features
//!
//! - **One record per request**: emitted when the response body finishes
//!   streaming, the client disconnects, or the handler panics
//! - **Status aware**: `2xx`/`3xx` log at `INFO`, `4xx` at `WARN`, `5xx` at `ERROR`
//! - **Error diagnostics**: the first 512 bytes of error response bodies are
//!   included without buffering the body that goes to the client
//! - **Redaction**: `authorization`, `cookie` and `set-cookie` are never
//!   logged, plus any headers you add
//! - **Lazy fields**: the field tree is only built when a backend actually
//!   writes the record
//!
//! ## Record shape
//!
//! ```text
//! message: "GET /widgets - 404 Client Error"
//! fields: {
//!   httpRequest:  { requestURL, requestMethod, requestPath, remoteIP, proto, requestID?, scheme?, header? },
//!   httpResponse: { status, bytes, elapsed, body?, header? }
//! }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{http::StatusCode, routing::get, Router};
//! use httplog::{RecoverLayer, RequestLoggerConfig, RequestLoggerLayer, TracingLogger};
//! use tower::ServiceBuilder;
//!
//! async fn widgets() -> (StatusCode, &'static str) {
//!     (StatusCode::NOT_FOUND, "not found")
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt().json().init();
//!
//!     let config = RequestLoggerConfig::default().with_skip_headers(["x-api-key"]);
//!     let app = Router::new().route("/widgets", get(widgets)).layer(
//!         ServiceBuilder::new()
//!             .layer(RequestLoggerLayer::new(config, TracingLogger::new()))
//!             .layer(RecoverLayer::new()),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Custom backends
//!
//! Implement [`Logger`] to send records somewhere else:
//!
//! ```rust
//! use httplog::{Field, JsonEncoder, Logger};
//! use tracing::Level;
//!
//! #[derive(Clone, Default)]
//! struct StdoutLogger {
//!     bound: Vec<Field>,
//! }
//!
//! impl Logger for StdoutLogger {
//!     fn with(&self, fields: Vec<Field>) -> Self {
//!         let mut bound = self.bound.clone();
//!         bound.extend(fields);
//!         Self { bound }
//!     }
//!
//!     fn log(&self, level: Level, message: &str, fields: Vec<Field>) {
//!         let fields = JsonEncoder::encode_fields(self.bound.iter().chain(&fields));
//!         println!("{level} {message} {fields}");
//!     }
//! }
//! ```

use axum::{extract::Request, response::Response};
use serde::Deserialize;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, instrument};

pub mod body_wrapper;
use body_wrapper::{record_response, ResponseRecorder};

pub mod encoder;
pub use encoder::{EncodeError, Field, FieldSet, JsonEncoder, ObjectEncoder, ObjectMarshaler};

pub mod entry;
pub use entry::RequestLogEntry;

pub mod fields;
pub mod headers;
pub mod limit_buffer;

pub mod logger;
pub use logger::{LogRecord, Logger, MemoryLogger, TracingLogger};

pub mod recover;
pub use recover::{RecoverLayer, RecoverService};

pub mod status;

pub mod types;
pub use types::{PanicRecord, PanicReporter, SecureConnection};

/// Configuration for the request logging middleware.
///
/// # Examples
///
/// ```rust
/// use httplog::RequestLoggerConfig;
///
/// // Default configuration
/// let config = RequestLoggerConfig::default();
/// assert!(!config.concise);
///
/// // Quieter output that also hides an API key header
/// let config = RequestLoggerConfig::default()
///     .with_concise(true)
///     .with_skip_headers(["X-Api-Key"]);
///
/// // Or loaded from a config file
/// let config: RequestLoggerConfig =
///     serde_json::from_str(r#"{ "skip_headers": ["x-api-key"] }"#).unwrap();
/// assert_eq!(config.skip_headers, ["x-api-key"]);
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RequestLoggerConfig {
    /// Leave out the scheme, headers and error bodies
    pub concise: bool,
    /// Headers redacted in addition to `authorization`, `cookie` and `set-cookie`,
    /// matched case-insensitively
    pub skip_headers: Vec<String>,
}

impl RequestLoggerConfig {
    pub fn with_concise(mut self, concise: bool) -> Self {
        self.concise = concise;
        self
    }

    pub fn with_skip_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_headers = headers.into_iter().map(Into::into).collect();
        self
    }
}

/// Tower layer for the request logging middleware.
///
/// This is the main entry point. It wraps any service handling Axum requests
/// and logs one record per request through the given [`Logger`].
///
/// # Examples
///
/// ```rust,no_run
/// use httplog::{RequestLoggerConfig, RequestLoggerLayer, TracingLogger};
/// use axum::{routing::get, Router};
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let layer = RequestLoggerLayer::new(RequestLoggerConfig::default(), TracingLogger::new());
///
/// let app = Router::new().route("/hello", get(hello)).layer(layer);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
/// axum::serve(listener, app).await.unwrap();
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RequestLoggerLayer<L> {
    config: Arc<RequestLoggerConfig>,
    logger: L,
}

impl<L: Logger> RequestLoggerLayer<L> {
    /// Creates the layer. The configuration is frozen here and shared by every
    /// request the layer's services handle.
    pub fn new(config: RequestLoggerConfig, logger: L) -> Self {
        Self {
            config: Arc::new(config),
            logger,
        }
    }

    pub fn config(&self) -> &RequestLoggerConfig {
        &self.config
    }
}

impl<S, L: Logger> Layer<S> for RequestLoggerLayer<L> {
    type Service = RequestLoggerService<S, L>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLoggerService {
            inner,
            config: Arc::clone(&self.config),
            logger: self.logger.clone(),
        }
    }
}

/// Tower service implementation for the request logging middleware.
///
/// Opens a [`RequestLogEntry`] when a request arrives, exposes a
/// [`PanicReporter`] to the services below it, and routes the response
/// body through a [`ResponseRecorder`] that finalizes the entry.
///
/// Users typically don't interact with this type directly - it's created by [`RequestLoggerLayer`].
#[derive(Clone, Debug)]
pub struct RequestLoggerService<S, L> {
    inner: S,
    config: Arc<RequestLoggerConfig>,
    logger: L,
}

impl<S, L> Service<Request> for RequestLoggerService<S, L>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    L: Logger,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, mut request: Request) -> Self::Future {
        debug!(method = %request.method(), uri = %request.uri(), "Opening request log entry");

        let entry = RequestLogEntry::new(&self.logger, &request, Arc::clone(&self.config));
        let panics = PanicReporter::new();
        request.extensions_mut().insert(panics.clone());

        // Finalizes on drop, so a cancelled or failed request is still logged
        let recorder = ResponseRecorder::new(entry, panics);
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;
            Ok(record_response(response, recorder))
        })
    }
}

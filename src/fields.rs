//! Request and response field trees.
//!
//! Both builders capture owned copies of what they need and defer every bit of
//! formatting to the writer closures in [`FieldSet`].

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request, Version};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::RequestId;

use crate::encoder::{Field, FieldSet};
use crate::headers::header_log_fields;
use crate::types::SecureConnection;
use crate::RequestLoggerConfig;

/// Group name the request-side fields are nested under.
pub const REQUEST_FIELD: &str = "httpRequest";
/// Group name the response-side fields are nested under.
pub const RESPONSE_FIELD: &str = "httpResponse";

/// Renders a protocol version the way it appears on the request line.
pub(crate) fn proto_string(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/?",
    }
}

fn request_scheme<B>(request: &Request<B>) -> &'static str {
    let secure = request.uri().scheme_str() == Some("https")
        || request.extensions().get::<SecureConnection>().is_some();
    if secure {
        "https"
    } else {
        "http"
    }
}

fn request_host<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

fn request_id<B>(request: &Request<B>) -> Option<String> {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}

/// Builds the `httpRequest` field for an inbound request.
pub fn request_log_field<B>(request: &Request<B>, config: &Arc<RequestLoggerConfig>) -> Field {
    let scheme = request_scheme(request);
    let raw_uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let request_url = format!("{scheme}://{}{raw_uri}", request_host(request));
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let mut fields = FieldSet::new();
    fields.add_string("requestURL", request_url);
    fields.add_string("requestMethod", request.method().as_str().to_owned());
    fields.add_string("requestPath", request.uri().path().to_owned());
    fields.add_string("remoteIP", remote_addr);
    fields.add_string("proto", proto_string(request.version()));
    if let Some(id) = request_id(request) {
        fields.add_string("requestID", id);
    }

    if config.concise {
        return Field::object(REQUEST_FIELD, fields);
    }

    fields.add_string("scheme", scheme);
    if !request.headers().is_empty() {
        let headers = request.headers().clone();
        let config = Arc::clone(config);
        fields.add_object_with("header", move || header_log_fields(&headers, &config));
    }

    Field::object(REQUEST_FIELD, fields)
}

/// Outcome of a response as seen by the time the entry is finalized.
#[derive(Debug, Clone, Default)]
pub struct ResponseSummary {
    /// Status code, `0` when no response head was produced.
    pub status: u16,
    /// Body bytes forwarded to the client.
    pub bytes: u64,
    pub header: HeaderMap,
    pub elapsed: Duration,
    /// Captured body prefix, only meaningful for error statuses.
    pub body: Bytes,
}

/// Builds the `httpResponse` field.
pub fn response_log_field(response: ResponseSummary, config: &Arc<RequestLoggerConfig>) -> Field {
    let ResponseSummary {
        status,
        bytes,
        header,
        elapsed,
        body,
    } = response;

    let mut fields = FieldSet::new();
    fields.add_uint("status", u64::from(status));
    fields.add_uint("bytes", bytes);
    fields.add_duration("elapsed", elapsed);

    if !config.concise {
        // Error bodies are kept so the message sent back to the client can be inspected
        if status >= 400 {
            fields.push(move |enc| {
                enc.add_byte_string("body", &body);
                Ok(())
            });
        }
        if !header.is_empty() {
            let config = Arc::clone(config);
            fields.add_object_with("header", move || header_log_fields(&header, &config));
        }
    }

    Field::object(RESPONSE_FIELD, fields)
}

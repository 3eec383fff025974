//! Per-request log entry.

use axum::http::Request;
use std::sync::Arc;

use crate::encoder::Field;
use crate::fields::{request_log_field, response_log_field, ResponseSummary};
use crate::logger::Logger;
use crate::status::{status_label, status_level};
use crate::types::PanicRecord;
use crate::RequestLoggerConfig;

/// Accumulates the logging context of a single request.
///
/// An entry is opened when the request arrives, with the `httpRequest` fields
/// bound to its logger, and [finalized](RequestLogEntry::finalize) once the
/// response is known. Finalizing consumes the entry, so every entry emits
/// exactly one record.
#[derive(Debug)]
pub struct RequestLogEntry<L> {
    logger: L,
    message: String,
    config: Arc<RequestLoggerConfig>,
}

impl<L: Logger> RequestLogEntry<L> {
    /// Opens an entry for `request`. The message starts out as `METHOD PATH`.
    pub fn new<B>(logger: &L, request: &Request<B>, config: Arc<RequestLoggerConfig>) -> Self {
        let field = request_log_field(request, &config);
        Self {
            logger: logger.with(vec![field]),
            message: format!("{} {}", request.method(), request.uri().path()),
            config,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn concise(&self) -> bool {
        self.config.concise
    }

    /// Records a recovered panic. The panic value replaces the message, and the
    /// value and stack trace are bound to the entry's logger.
    pub fn panic(&mut self, record: &PanicRecord) {
        self.logger = self.logger.with(vec![
            Field::string("stacktrace", record.stack.clone()),
            Field::string("panic", record.value.clone()),
        ]);
        self.message = record.value.clone();
    }

    /// Emits the single record for this request.
    ///
    /// The message becomes `"<message> - <status> <label>"` and the record is
    /// logged at the severity the status maps to.
    pub fn finalize(self, response: ResponseSummary) {
        let status = response.status;
        let mut message = String::with_capacity(self.message.len() + 24);
        if !self.message.is_empty() {
            message.push_str(&self.message);
            message.push_str(" - ");
        }
        message.push_str(&status.to_string());
        message.push(' ');
        message.push_str(status_label(status));

        let field = response_log_field(response, &self.config);
        self.logger.log(status_level(status), &message, vec![field]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLogger;
    use axum::http::HeaderMap;
    use bytes::Bytes;
    use std::time::Duration;
    use tracing::Level;

    fn open(logger: &MemoryLogger, concise: bool) -> RequestLogEntry<MemoryLogger> {
        let request = Request::get("/widgets").body(()).unwrap();
        let config = Arc::new(RequestLoggerConfig::default().with_concise(concise));
        RequestLogEntry::new(logger, &request, config)
    }

    fn not_found() -> ResponseSummary {
        ResponseSummary {
            status: 404,
            bytes: 9,
            header: HeaderMap::new(),
            elapsed: Duration::from_millis(1),
            body: Bytes::from_static(b"not found"),
        }
    }

    #[test]
    fn test_finalize_not_found() {
        let logger = MemoryLogger::new();
        let entry = open(&logger, false);
        assert_eq!(entry.message(), "GET /widgets");

        entry.finalize(not_found());

        let records = logger.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.message, "GET /widgets - 404 Client Error");
        assert_eq!(record.level, Level::WARN);
        assert_eq!(record.fields["httpRequest"]["requestPath"], "/widgets");
        assert_eq!(record.fields["httpResponse"]["status"], 404);
        assert_eq!(record.fields["httpResponse"]["bytes"], 9);
        assert_eq!(record.fields["httpResponse"]["body"], "not found");
    }

    #[test]
    fn test_finalize_concise_omits_body() {
        let logger = MemoryLogger::new();
        open(&logger, true).finalize(not_found());

        let record = &logger.records()[0];
        assert_eq!(record.message, "GET /widgets - 404 Client Error");
        assert!(record.fields["httpResponse"].get("body").is_none());
    }

    #[test]
    fn test_finalize_without_status() {
        let logger = MemoryLogger::new();
        open(&logger, false).finalize(ResponseSummary::default());

        let record = &logger.records()[0];
        assert_eq!(record.message, "GET /widgets - 0 Unknown");
        assert_eq!(record.level, Level::WARN);
    }

    #[test]
    fn test_panic_replaces_message_and_binds_stack() {
        let logger = MemoryLogger::new();
        let mut entry = open(&logger, false);
        entry.panic(&PanicRecord {
            value: "boom".into(),
            stack: "at handler".into(),
        });
        entry.finalize(ResponseSummary {
            status: 500,
            ..ResponseSummary::default()
        });

        let record = &logger.records()[0];
        assert_eq!(record.message, "boom - 500 Server Error");
        assert_eq!(record.level, Level::ERROR);
        assert_eq!(record.fields["panic"], "boom");
        assert_eq!(record.fields["stacktrace"], "at handler");
        assert_eq!(record.fields["httpResponse"]["status"], 500);
        assert_eq!(record.fields["httpResponse"]["body"], "");
    }

    #[test]
    fn test_empty_message_has_no_separator() {
        let logger = MemoryLogger::new();
        let mut entry = open(&logger, true);
        entry.panic(&PanicRecord {
            value: String::new(),
            stack: String::new(),
        });
        entry.finalize(ResponseSummary {
            status: 200,
            ..ResponseSummary::default()
        });

        assert_eq!(logger.records()[0].message, "200 OK");
    }
}

//! Logging backends.
//!
//! The middleware never reaches for a global logger: a [`Logger`] is handed to
//! [`RequestLoggerLayer::new`](crate::RequestLoggerLayer::new) and every request
//! derives its own logger from it with the request fields bound.
//!
//! Two backends ship with the crate:
//! - [`TracingLogger`] forwards each record as a `tracing` event.
//! - [`MemoryLogger`] keeps records in memory, which is what tests want.

use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Level;

use crate::encoder::{Field, JsonEncoder};

/// A structured logging backend.
///
/// Implementations must be cheap to clone and safe to share across requests.
///
/// # Examples
///
/// ```rust
/// use httplog::{Field, Logger, MemoryLogger};
///
/// let logger = MemoryLogger::new();
/// let scoped = logger.with(vec![Field::string("component", "billing")]);
/// scoped.warn("quota low", vec![]);
///
/// let records = logger.records();
/// assert_eq!(records[0].fields["component"], "billing");
/// ```
pub trait Logger: Clone + Send + Sync + 'static {
    /// Derives a logger that attaches `fields` to every record it emits.
    fn with(&self, fields: Vec<Field>) -> Self;

    /// Emits one record at `level`.
    fn log(&self, level: Level, message: &str, fields: Vec<Field>);

    fn debug(&self, message: &str, fields: Vec<Field>) {
        self.log(Level::DEBUG, message, fields);
    }

    fn info(&self, message: &str, fields: Vec<Field>) {
        self.log(Level::INFO, message, fields);
    }

    fn warn(&self, message: &str, fields: Vec<Field>) {
        self.log(Level::WARN, message, fields);
    }

    fn error(&self, message: &str, fields: Vec<Field>) {
        self.log(Level::ERROR, message, fields);
    }
}

fn bind(bound: &Arc<Vec<Field>>, fields: Vec<Field>) -> Arc<Vec<Field>> {
    let mut merged = Vec::with_capacity(bound.len() + fields.len());
    merged.extend(bound.iter().cloned());
    merged.extend(fields);
    Arc::new(merged)
}

/// Forwards records to `tracing`.
///
/// The field tree is realized as JSON and attached to the event as `fields`,
/// but only when the subscriber has the event's level enabled.
///
/// # Examples
///
/// ```rust,no_run
/// use httplog::{RequestLoggerConfig, RequestLoggerLayer, TracingLogger};
///
/// tracing_subscriber::fmt().json().init();
/// let layer = RequestLoggerLayer::new(RequestLoggerConfig::default(), TracingLogger::new());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    bound: Arc<Vec<Field>>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn render(&self, fields: &[Field]) -> Value {
        JsonEncoder::encode_fields(self.bound.iter().chain(fields))
    }
}

macro_rules! emit {
    ($logger:expr, $level:expr, $message:expr, $fields:expr) => {
        if tracing::enabled!($level) {
            let fields = $logger.render(&$fields);
            tracing::event!($level, fields = %fields, "{}", $message);
        }
    };
}

impl Logger for TracingLogger {
    fn with(&self, fields: Vec<Field>) -> Self {
        Self {
            bound: bind(&self.bound, fields),
        }
    }

    fn log(&self, level: Level, message: &str, fields: Vec<Field>) {
        match level {
            Level::ERROR => emit!(self, Level::ERROR, message, fields),
            Level::WARN => emit!(self, Level::WARN, message, fields),
            Level::INFO => emit!(self, Level::INFO, message, fields),
            Level::DEBUG => emit!(self, Level::DEBUG, message, fields),
            _ => emit!(self, Level::TRACE, message, fields),
        }
    }
}

/// A record kept by [`MemoryLogger`].
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    /// Bound and per-call fields, realized as a JSON object
    pub fields: Value,
}

/// Keeps every record in memory.
///
/// Clones and derived loggers share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    bound: Arc<Vec<Field>>,
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records emitted so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the records emitted so far.
    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Logger for MemoryLogger {
    fn with(&self, fields: Vec<Field>) -> Self {
        Self {
            bound: bind(&self.bound, fields),
            records: Arc::clone(&self.records),
        }
    }

    fn log(&self, level: Level, message: &str, fields: Vec<Field>) {
        let record = LogRecord {
            level,
            message: message.to_owned(),
            fields: JsonEncoder::encode_fields(self.bound.iter().chain(&fields)),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

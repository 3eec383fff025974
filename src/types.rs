//! Request extensions shared between the logging middleware and its host.

use std::sync::{Arc, OnceLock};

/// Marker extension a host inserts on requests that arrived over TLS.
///
/// Requests carrying it, or an absolute `https` URI, are logged with the
/// `https` scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureConnection;

/// A panic recovered while handling a request.
#[derive(Debug, Clone)]
pub struct PanicRecord {
    /// The rendered panic payload
    pub value: String,
    /// Stack trace captured where the panic was recovered
    pub stack: String,
}

/// Handle to the pending log entry of the current request.
///
/// The logging middleware inserts one into the request extensions. A recovery
/// layer further down the stack reports a caught panic through it and the
/// entry picks the report up when it is finalized.
#[derive(Debug, Clone, Default)]
pub struct PanicReporter {
    slot: Arc<OnceLock<PanicRecord>>,
}

impl PanicReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a panic. Only the first report for a request is kept.
    pub fn report(&self, value: impl Into<String>, stack: impl Into<String>) {
        let _ = self.slot.set(PanicRecord {
            value: value.into(),
            stack: stack.into(),
        });
    }

    pub fn get(&self) -> Option<&PanicRecord> {
        self.slot.get()
    }
}

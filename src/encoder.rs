//! Deferred structured fields.
//!
//! Log fields are not serialized when they are built. A [`FieldSet`] is an
//! ordered list of writer closures, and nothing runs until a logging backend
//! hands the set an [`ObjectEncoder`] at emit time. Records that a backend
//! filters out therefore never pay for header redaction or body rendering.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Error raised while writing a field into an encoder.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("invalid value for field `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("{0}")]
    Custom(String),
}

/// Visitor that structured values are written into.
pub trait ObjectEncoder {
    fn add_string(&mut self, key: &str, value: &str);
    fn add_int(&mut self, key: &str, value: i64);
    fn add_uint(&mut self, key: &str, value: u64);
    fn add_duration(&mut self, key: &str, value: Duration);
    /// Adds raw bytes that are expected to be mostly text, such as a body prefix.
    fn add_byte_string(&mut self, key: &str, value: &[u8]);
    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<(), EncodeError>;
}

/// A value that knows how to write itself into an [`ObjectEncoder`].
pub trait ObjectMarshaler: Send + Sync {
    fn marshal(&self, enc: &mut dyn ObjectEncoder) -> Result<(), EncodeError>;
}

type FieldWriter = Box<dyn Fn(&mut dyn ObjectEncoder) -> Result<(), EncodeError> + Send + Sync>;

/// Ordered list of deferred field writers.
///
/// ```rust
/// use httplog::encoder::{FieldSet, JsonEncoder, ObjectMarshaler};
///
/// let mut set = FieldSet::new();
/// set.add_string("requestMethod", "GET");
/// set.add_uint("status", 200);
///
/// let mut enc = JsonEncoder::new();
/// set.marshal(&mut enc).unwrap();
/// assert_eq!(enc.into_value()["status"], 200);
/// ```
#[derive(Default)]
pub struct FieldSet {
    writers: Vec<FieldWriter>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an arbitrary writer. Writers run in insertion order.
    pub fn push<F>(&mut self, writer: F)
    where
        F: Fn(&mut dyn ObjectEncoder) -> Result<(), EncodeError> + Send + Sync + 'static,
    {
        self.writers.push(Box::new(writer));
    }

    pub fn add_string(&mut self, key: impl Into<Cow<'static, str>>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        self.push(move |enc| {
            enc.add_string(&key, &value);
            Ok(())
        });
    }

    pub fn add_uint(&mut self, key: &'static str, value: u64) {
        self.push(move |enc| {
            enc.add_uint(key, value);
            Ok(())
        });
    }

    pub fn add_duration(&mut self, key: &'static str, value: Duration) {
        self.push(move |enc| {
            enc.add_duration(key, value);
            Ok(())
        });
    }

    /// Appends a nested object whose fields are produced lazily by `build`.
    pub fn add_object_with<F>(&mut self, key: &'static str, build: F)
    where
        F: Fn() -> FieldSet + Send + Sync + 'static,
    {
        self.push(move |enc| enc.add_object(key, &build()));
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl ObjectMarshaler for FieldSet {
    fn marshal(&self, enc: &mut dyn ObjectEncoder) -> Result<(), EncodeError> {
        for writer in &self.writers {
            writer(enc)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSet")
            .field("len", &self.writers.len())
            .finish()
    }
}

/// A named top-level field attached to a log record or bound to a logger.
#[derive(Clone)]
pub struct Field {
    key: Cow<'static, str>,
    value: FieldValue,
}

#[derive(Clone)]
enum FieldValue {
    String(String),
    Object(Arc<dyn ObjectMarshaler>),
}

impl Field {
    pub fn string(key: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::String(value.into()),
        }
    }

    pub fn object(key: impl Into<Cow<'static, str>>, value: impl ObjectMarshaler + 'static) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Object(Arc::new(value)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Writes this field into `enc`. Nested objects are realized here.
    pub fn encode(&self, enc: &mut dyn ObjectEncoder) -> Result<(), EncodeError> {
        match &self.value {
            FieldValue::String(value) => {
                enc.add_string(&self.key, value);
                Ok(())
            }
            FieldValue::Object(value) => enc.add_object(&self.key, value.as_ref()),
        }
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Field");
        s.field("key", &self.key);
        match &self.value {
            FieldValue::String(value) => s.field("value", value),
            FieldValue::Object(_) => s.field("value", &"<object>"),
        };
        s.finish()
    }
}

/// Encoder that realizes fields into a JSON object.
///
/// Durations are written as floating point seconds and byte strings as lossy
/// UTF-8.
#[derive(Debug, Default)]
pub struct JsonEncoder {
    map: Map<String, Value>,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Realizes `fields` in order. A field that fails to encode is replaced by a
    /// `<key>Error` entry describing the failure so the record is still emitted.
    pub fn encode_fields<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Value {
        let mut enc = Self::new();
        for field in fields {
            if let Err(e) = field.encode(&mut enc) {
                enc.map
                    .insert(format!("{}Error", field.key()), Value::String(e.to_string()));
            }
        }
        enc.into_value()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }
}

impl ObjectEncoder for JsonEncoder {
    fn add_string(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_owned(), Value::from(value));
    }

    fn add_int(&mut self, key: &str, value: i64) {
        self.map.insert(key.to_owned(), Value::from(value));
    }

    fn add_uint(&mut self, key: &str, value: u64) {
        self.map.insert(key.to_owned(), Value::from(value));
    }

    fn add_duration(&mut self, key: &str, value: Duration) {
        self.map
            .insert(key.to_owned(), Value::from(value.as_secs_f64()));
    }

    fn add_byte_string(&mut self, key: &str, value: &[u8]) {
        self.map.insert(
            key.to_owned(),
            Value::from(String::from_utf8_lossy(value).into_owned()),
        );
    }

    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<(), EncodeError> {
        let mut nested = JsonEncoder::new();
        value.marshal(&mut nested)?;
        self.map.insert(key.to_owned(), nested.into_value());
        Ok(())
    }
}

//! Header redaction.

use axum::http::HeaderMap;

use crate::encoder::FieldSet;
use crate::RequestLoggerConfig;

/// Placeholder written in place of a redacted header value.
pub const REDACTED: &str = "***";

/// Headers that are always redacted, whatever the configuration says.
const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "cookie", "set-cookie"];

fn is_redacted(name: &str, config: &RequestLoggerConfig) -> bool {
    SENSITIVE_HEADERS.contains(&name)
        || config
            .skip_headers
            .iter()
            .any(|skip| skip.eq_ignore_ascii_case(name))
}

/// Builds one string field per header name.
///
/// Names are emitted lower-cased. Sensitive and configured skip headers are
/// replaced with [`REDACTED`] and scanning carries on with the next header.
/// A header sent several times is joined as `[v1], [v2]`.
pub fn header_log_fields(headers: &HeaderMap, config: &RequestLoggerConfig) -> FieldSet {
    let mut fields = FieldSet::new();

    for name in headers.keys() {
        // `HeaderName` is already normalized to lower case
        let key = name.as_str().to_owned();
        if is_redacted(&key, config) {
            fields.add_string(key, REDACTED);
            continue;
        }

        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();

        match values.as_slice() {
            [] => continue,
            [single] => fields.add_string(key, single.clone()),
            many => fields.add_string(key, format!("[{}]", many.join("], ["))),
        }
    }

    fields
}

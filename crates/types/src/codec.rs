// Path: crates/types/src/codec.rs

//! Defines the canonical, deterministic JSON codec for all signed or hashed payloads.
//!
//! This module implements JCS (RFC 8785) serialization under the kernel's
//! Canonical Schema Normal Form (CSNF) rules. By centralizing the codec logic
//! here in the base `types` crate, we ensure that every component produces the
//! exact same bytes for the same value, preventing signature and content-hash
//! divergence between producers and verifiers.
//!
//! CSNF tightens JCS in four ways:
//! - object keys are sorted by Unicode code point, ascending, at every depth;
//! - `null` object members are stripped at every depth;
//! - every string (keys included) is NFC-normalized;
//! - non-integer numbers are rejected outright. Fractional values travel as
//!   decimal strings validated by [`validate_decimal_string`].

use crate::error::CanonError;
use serde::Serialize;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

/// Serializes a value into its canonical CSNF byte representation.
///
/// The output is byte-identical across runs, processes, and host languages.
/// Any non-integer JSON number anywhere in the value is a
/// [`CanonError::FloatRejected`].
pub fn jcs(value: &Value) -> Result<Vec<u8>, CanonError> {
    let mut out = Vec::with_capacity(128);
    write_value(&mut out, value)?;
    Ok(out)
}

/// Serializes a value canonically and returns it as a UTF-8 string.
pub fn jcs_string(value: &Value) -> Result<String, CanonError> {
    let bytes = jcs(value)?;
    String::from_utf8(bytes).map_err(|_| CanonError::InvalidUtf8)
}

/// Bridges a typed record into the canonical value model.
///
/// This is the entry point used by every signer and hasher call site: the
/// record is converted through `serde_json` and then canonicalized, so the
/// CSNF rules (null stripping, float rejection) apply to the typed form too.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value, CanonError> {
    serde_json::to_value(value).map_err(|e| CanonError::Serialize(e.to_string()))
}

/// Canonicalizes a typed record straight to bytes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    jcs(&to_canonical_value(value)?)
}

/// Validates an RFC 3339 timestamp string and re-renders it in canonical form:
/// UTC, `Z` suffix, millisecond precision.
pub fn canonical_timestamp(input: &str) -> Result<String, CanonError> {
    let parsed = chrono::DateTime::parse_from_rfc3339(input)
        .map_err(|e| CanonError::MalformedTimestamp(format!("{input:?}: {e}")))?;
    Ok(format_timestamp(&parsed.with_timezone(&chrono::Utc)))
}

/// Renders a timestamp in the kernel's canonical wire form.
pub fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Validates the decimal-string profile for fractional values:
/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?`.
pub fn validate_decimal_string(input: &str) -> Result<(), CanonError> {
    let rejected = || CanonError::InvalidDecimalString(input.to_string());
    let mut chars = input.chars().peekable();

    if chars.peek() == Some(&'-') {
        chars.next();
    }
    // Integer part: "0", or a non-zero digit followed by any digits.
    match chars.next() {
        Some('0') => {
            if matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(rejected()); // leading zero
            }
        }
        Some(c) if c.is_ascii_digit() => {
            while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
                chars.next();
            }
        }
        _ => return Err(rejected()),
    }
    // Optional fractional part: '.' followed by one or more digits.
    if chars.peek() == Some(&'.') {
        chars.next();
        let mut digits = 0usize;
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.next();
            digits += 1;
        }
        if digits == 0 {
            return Err(rejected());
        }
    }
    if chars.next().is_some() {
        return Err(rejected());
    }
    Ok(())
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<(), CanonError> {
    match value {
        Value::Null => {
            // Null object members are stripped by the object arm; a null that
            // reaches this point is a top-level null or an array element, and
            // array elements are preserved so sibling paths stay stable.
            out.extend_from_slice(b"null");
            Ok(())
        }
        Value::Bool(b) => {
            out.extend_from_slice(if *b { b"true" } else { b"false" });
            Ok(())
        }
        Value::Number(n) => write_number(out, n),
        Value::String(s) => {
            write_escaped(out, &normalize(s));
            Ok(())
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
            Ok(())
        }
        Value::Object(members) => {
            // Collect non-null members under NFC keys, then sort by Unicode
            // code point. UTF-8 byte order and code point order coincide.
            let mut sorted: Vec<(String, &Value)> = Vec::with_capacity(members.len());
            for (key, member) in members {
                if member.is_null() {
                    continue;
                }
                sorted.push((normalize(key), member));
            }
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            for pair in sorted.windows(2) {
                if pair[0].0 == pair[1].0 {
                    return Err(CanonError::DuplicateKey(pair[0].0.clone()));
                }
            }
            out.push(b'{');
            for (i, (key, member)) in sorted.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_escaped(out, key);
                out.push(b':');
                write_value(out, member)?;
            }
            out.push(b'}');
            Ok(())
        }
    }
}

fn write_number(out: &mut Vec<u8>, n: &serde_json::Number) -> Result<(), CanonError> {
    if let Some(i) = n.as_i64() {
        out.extend_from_slice(i.to_string().as_bytes());
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        out.extend_from_slice(u.to_string().as_bytes());
        return Ok(());
    }
    // Anything serde_json could not represent as an integer is a float.
    Err(CanonError::FloatRejected(n.to_string()))
}

/// Escapes a string per JSON with the two-character escapes JCS mandates and
/// `\u00xx` (lowercase hex) for remaining control characters. `<`, `>` and
/// `&` pass through unescaped.
fn write_escaped(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\u{000C}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

fn normalize(s: &str) -> String {
    s.nfc().collect()
}

/// Serde helpers pinning every kernel timestamp to the canonical wire form.
pub mod ts {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a timestamp as RFC 3339 UTC with millisecond precision.
    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&super::format_timestamp(ts))
    }

    /// Deserializes any RFC 3339 timestamp, normalizing to UTC.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for optional canonical timestamps.
pub mod ts_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes an optional timestamp in canonical form.
    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => ser.serialize_some(&super::format_timestamp(ts)),
            None => ser.serialize_none(),
        }
    }

    /// Deserializes an optional RFC 3339 timestamp, normalizing to UTC.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(de)?;
        raw.map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

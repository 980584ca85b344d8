//! Canonical text encoding used as hash input.
//!
//! Transaction ids and block hashes are digests over plain strings, so every
//! number and string that feeds a digest must render identically no matter
//! which implementation produced it. The rules here are:
//!
//! - floats use the shortest representation that round-trips, always carry a
//!   fractional part (`50.0`), and switch to exponent form outside
//!   `[1e-4, 1e16)` with a signed, at least two digit exponent (`1e+16`,
//!   `1.5e-07`)
//! - JSON strings escape `"`, `\`, control characters and everything outside
//!   printable ASCII, the latter as lowercase `\uXXXX` (surrogate pairs above
//!   the BMP)
//! - transaction lists are JSON arrays of key-sorted objects with `", "` and
//!   `": "` separators

use crate::transaction::Transaction;
use std::fmt::Write;

/// Render a float the way it appears in hash input strings.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return format_exponent(value);
    }

    let mut out = value.to_string();
    if !out.contains('.') {
        out.push_str(".0");
    }
    out
}

/// Render a float as a JSON number. Finite values match [`format_float`];
/// non-finite values use the JavaScript spellings.
pub fn format_json_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format_float(value)
    }
}

fn format_exponent(value: f64) -> String {
    // `{:e}` yields the shortest round-trip mantissa, e.g. "1.5e-7".
    let raw = format!("{:e}", value);
    let (mantissa, exponent) = match raw.split_once('e') {
        Some(parts) => parts,
        None => return raw,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

/// Append `value` to `out` as a quoted, ASCII-only JSON string.
pub fn write_json_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

/// Encode one transaction as a key-sorted JSON object.
pub fn write_transaction(out: &mut String, tx: &Transaction) {
    out.push_str("{\"amount\": ");
    out.push_str(&format_json_float(tx.amount));
    out.push_str(", \"recipient\": ");
    write_json_string(out, &tx.recipient);
    out.push_str(", \"sender\": ");
    write_json_string(out, &tx.sender);
    out.push_str(", \"timestamp\": ");
    out.push_str(&format_json_float(tx.timestamp));
    out.push_str(", \"transaction_id\": ");
    write_json_string(out, &tx.id);
    out.push('}');
}

/// Encode an ordered transaction list as the JSON array used in block hashes.
pub fn transactions_json(transactions: &[Transaction]) -> String {
    let mut out = String::with_capacity(transactions.len() * 192 + 2);
    out.push('[');
    for (i, tx) in transactions.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_transaction(&mut out, tx);
    }
    out.push(']');
    out
}

/// Serde adapter for `f64` fields of the interchange format.
///
/// JSON has no literal for NaN or the infinities and serde_json writes them
/// as `null`, which would not read back. Non-finite values are written as the
/// strings `"NaN"`, `"Infinity"` and `"-Infinity"` instead; finite values stay
/// plain numbers.
pub mod json_float {
    use super::format_json_float;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&format_json_float(*value))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(JsonFloatVisitor)
    }

    struct JsonFloatVisitor;

    impl<'de> Visitor<'de> for JsonFloatVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number, \"NaN\", \"Infinity\" or \"-Infinity\"")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            match value {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                _ => Err(E::invalid_value(de::Unexpected::Str(value), &self)),
            }
        }
    }
}

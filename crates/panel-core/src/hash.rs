//! Canonical content hashing for report payloads.
//!
//! The test tool computes a SHA-256 over `json.dumps(data, sort_keys=True,
//! ensure_ascii=True)` of `{"results": ..., "logs": ...}` and asks the panel
//! whether that hash already exists before submitting. The panel therefore
//! has to produce byte-for-byte identical serializations: object keys sorted,
//! `", "` between items, `": "` between key and value, and every non-ASCII
//! character escaped as `\uXXXX` (surrogate pairs above the BMP).
//!
//! Report payloads carry strings, integers, booleans and nulls. Float
//! formatting is not part of the cross-tool contract.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute the canonical content hash for one version's results and logs.
///
/// `results` is the per-version map of test results exactly as submitted;
/// `logs` is the attached-log list (or `None` when nothing was attached).
pub fn content_hash(results: &Value, logs: Option<&Value>) -> String {
    let empty = Value::Array(Vec::new());
    let logs = logs.unwrap_or(&empty);

    let mut out = String::new();
    out.push('{');
    out.push_str("\"logs\": ");
    write_canonical(&mut out, logs);
    out.push_str(", \"results\": ");
    write_canonical(&mut out, results);
    out.push('}');

    let digest = Sha256::digest(out.as_bytes());
    hex_string(&digest)
}

/// Serialize a JSON value the way Python's `json.dumps(v, sort_keys=True,
/// ensure_ascii=True)` does.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_escaped(out, key);
                out.push_str(": ");
                // Key came from the map, so the lookup cannot fail.
                write_canonical(out, &map[key.as_str()]);
            }
            out.push('}');
        }
    }
}

/// Escape a string like Python's ensure_ascii encoder: printable ASCII is
/// literal, everything else becomes a short escape or `\uXXXX`.
fn write_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (' '..='\u{7e}').contains(&c) => out.push(c),
            c => {
                let code = c as u32;
                if code < 0x10000 {
                    out.push_str(&format!("\\u{code:04x}"));
                } else {
                    // UTF-16 surrogate pair
                    let v = code - 0x10000;
                    let high = 0xd800 + (v >> 10);
                    let low = 0xdc00 + (v & 0x3ff);
                    out.push_str(&format!("\\u{high:04x}\\u{low:04x}"));
                }
            }
        }
    }
    out.push('"');
}

fn hex_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

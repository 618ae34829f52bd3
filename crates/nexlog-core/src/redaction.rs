//! Redaction engine
//!
//! Produces a deep copy of a JSON value in which every object key matching a
//! sensitive name (case-insensitive, exact) has its value replaced by
//! [`REDACTION_MASK`]. Structure and non-sensitive siblings are preserved.
//! Redaction never fails: nesting beyond [`MAX_DEPTH`] is cut off with
//! [`TRUNCATION_MARK`].

use lazy_static::lazy_static;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Replacement for sensitive values
pub const REDACTION_MASK: &str = "[REDACTED]";
/// Replacement for subtrees nested too deeply to copy
pub const TRUNCATION_MARK: &str = "[TRUNCATED]";
/// Maximum nesting depth copied
pub const MAX_DEPTH: usize = 64;

/// Field names masked in bodies, query parameters and extras
pub const DEFAULT_BODY_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "key",
    "authorization",
    "credit_card",
    "ssn",
    "social_security",
    "api_key",
];

/// Header names masked in request and response headers
pub const DEFAULT_HEADER_KEYS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

lazy_static! {
    static ref DEFAULT_RULES: RedactionRules = RedactionRules::default();
}

/// Immutable sets of sensitive field and header names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionRules {
    body_keys: HashSet<String>,
    header_keys: HashSet<String>,
}

impl Default for RedactionRules {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_KEYS.iter().copied(), DEFAULT_HEADER_KEYS.iter().copied())
    }
}

impl RedactionRules {
    pub fn new<B, H>(body_keys: B, header_keys: H) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        Self {
            body_keys: body_keys.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
            header_keys: header_keys.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        }
    }

    /// Shared instance holding the default key sets
    pub fn global() -> &'static RedactionRules {
        &DEFAULT_RULES
    }

    pub fn is_sensitive_key(&self, key: &str) -> bool {
        self.body_keys.contains(&key.to_lowercase())
    }

    pub fn is_sensitive_header(&self, name: &str) -> bool {
        self.header_keys.contains(&name.to_lowercase())
    }

    /// Redacted deep copy of `value`
    pub fn redact(&self, value: &Value) -> Value {
        self.redact_at(value, 0)
    }

    /// Redacted deep copy of an object's fields
    pub fn redact_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        self.redact_fields(map, 0)
    }

    /// Flatten headers into an object, masking sensitive names.
    ///
    /// Repeated header names are joined with `", "`.
    pub fn redact_headers<'a, I>(&self, headers: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut out = Map::new();
        for (name, value) in headers {
            let name = name.to_lowercase();
            if self.is_sensitive_header(&name) {
                out.insert(name, Value::String(REDACTION_MASK.to_string()));
                continue;
            }
            match out.get_mut(&name) {
                Some(Value::String(existing)) => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                _ => {
                    out.insert(name, Value::String(value.to_string()));
                }
            }
        }
        out
    }

    fn redact_at(&self, value: &Value, depth: usize) -> Value {
        if depth >= MAX_DEPTH {
            return Value::String(TRUNCATION_MARK.to_string());
        }
        match value {
            Value::Object(map) => Value::Object(self.redact_fields(map, depth)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.redact_at(item, depth + 1)).collect())
            }
            scalar => scalar.clone(),
        }
    }

    fn redact_fields(&self, map: &Map<String, Value>, depth: usize) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| {
                let value = if self.is_sensitive_key(key) {
                    Value::String(REDACTION_MASK.to_string())
                } else {
                    self.redact_at(value, depth + 1)
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// Redact with the default rules
pub fn redact(value: &Value) -> Value {
    DEFAULT_RULES.redact(value)
}

/// Redact headers with the default rules
pub fn redact_headers<'a, I>(headers: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    DEFAULT_RULES.redact_headers(headers)
}

//! Key Builder Module
//!
//! Deterministic cache keys: `prefix:pos1:pos2:name1=v1:name2=v2`.
//! Positional arguments keep their order, keyword arguments are sorted by
//! name. Strings, numbers and booleans render as their literal text; any
//! other argument is replaced by a short SHA-256 digest of its JSON form.
//! `\`, `:` and `=` inside strings and keyword names are backslash-escaped
//! so argument boundaries cannot be forged.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Separator between key segments.
pub const KEY_SEPARATOR: char = ':';

/// Hex characters kept from an argument digest.
pub const DIGEST_LEN: usize = 16;

// == Call Args ==
/// Arguments of one call to a memoized operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Serialize) -> Self {
        self.positional.push(to_value(value));
        self
    }

    /// Sets a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        self.keyword.insert(name.into(), to_value(value));
        self
    }

    /// Positional argument at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument by name, if any.
    pub fn get_kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }
}

fn to_value(value: impl Serialize) -> Value {
    // Serializing into a Value only fails for maps with non-string keys.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

// == Key Builder ==
/// Fluent builder for cache keys.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
    args: CallArgs,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            args: CallArgs::new(),
        }
    }

    pub fn arg(mut self, value: impl Serialize) -> Self {
        self.args = self.args.arg(value);
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        self.args = self.args.kwarg(name, value);
        self
    }

    pub fn build(&self) -> String {
        build_key(&self.prefix, &self.args)
    }
}

/// Builds the key for `prefix` and `args`. Never fails.
pub fn build_key(prefix: &str, args: &CallArgs) -> String {
    let mut key = String::from(prefix);
    for value in &args.positional {
        key.push(KEY_SEPARATOR);
        key.push_str(&render(value));
    }
    // BTreeMap iterates in name order.
    for (name, value) in &args.keyword {
        key.push(KEY_SEPARATOR);
        key.push_str(&escape(name));
        key.push('=');
        key.push_str(&render(value));
    }
    key
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => escape(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => digest(other),
    }
}

fn escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if matches!(c, '\\' | KEY_SEPARATOR | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn digest(value: &Value) -> String {
    // serde_json sorts object keys, so equal objects hash equally.
    let canonical = value.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(DIGEST_LEN);
    hex
}

//! Flat, untyped request parameters as they arrive from the outer shell.

use std::collections::BTreeMap;

/// Raw key/value input. Values are untrusted; nothing here validates them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    pairs: BTreeMap<String, String>,
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(cow) => cow.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned(),
    }
}

impl RawParams {
    pub fn new() -> Self { Self::default() }

    /// Decode `a=1&b=x%20y`. A repeated key keeps its last value; a key without `=` gets an empty value.
    pub fn from_query_string(qs: &str) -> Self {
        let mut out = Self::new();
        let qs = qs.strip_prefix('?').unwrap_or(qs);
        for part in qs.split('&') {
            if part.is_empty() { continue; }
            let (k, v) = part.split_once('=').unwrap_or((part, ""));
            let key = decode_component(k);
            if key.is_empty() { continue; }
            out.pairs.insert(key, decode_component(v));
        }
        out
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.pairs.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter { out.insert(k, v); }
        out
    }
}

/// Split a comma-delimited multi-valued parameter. Blank items are skipped.
pub fn split_list(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

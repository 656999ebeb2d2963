use std::collections::BTreeMap;

/// Message header fields keyed by canonical name (`content-type` is stored
/// as `Content-Type`). A key may carry several values, kept in arrival
/// order.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: BTreeMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.fields.get(&canonical_key(key)).map(Vec::as_slice)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Replaces every value of `key`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(canonical_key(key), vec![value.into()]);
    }

    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .entry(canonical_key(key))
            .or_default()
            .push(value.into());
    }

    /// Keys in sorted order, each with its values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }
}

/// `x-mailer` → `X-Mailer`. Keys holding anything but ASCII letters,
/// digits and `-` are kept untouched.
pub(crate) fn canonical_key(key: &str) -> String {
    let key = key.trim();
    if !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for ch in key.chars() {
        if upper {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch.to_ascii_lowercase());
        }
        upper = ch == '-';
    }
    out
}

//! Form Bodies
//!
//! Decodes `application/x-www-form-urlencoded` request bodies into the
//! fields the broker routes read.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;

/// Decoded form fields. Later duplicates overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    fields: HashMap<String, String>,
}

impl FormFields {
    /// Decode a form body
    pub fn parse(body: &Bytes) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|_| Error::Validation("form body is not valid UTF-8".into()))?;

        let mut fields = HashMap::new();
        for pair in text.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            fields.insert(decode(key)?, decode(value)?);
        }

        Ok(Self { fields })
    }

    /// Get a field if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Get a field that must be present and non-empty
    pub fn require(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::Validation(format!("missing form field: {}", name))),
        }
    }

    /// Number of decoded fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the form had no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn decode(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| Error::Validation(format!("malformed form encoding: {}", raw)))
}

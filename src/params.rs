//! Keyed string parameters and properties files
//!
//! `ParameterStore` is the parameter bag a host object keeps for itself:
//! raw strings by key, typed reads with defaults. `parse_properties` turns
//! `key=value` text into a `ParamMap` ready for submission.

use std::fs;
use std::path::Path;

use crate::dispatcher::ParamMap;
use crate::error::ParamError;
use crate::value;

/// Raw parameters owned by a host object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    params: ParamMap,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a properties file into a new store
    pub fn from_properties_file(path: impl AsRef<Path>) -> Result<Self, ParamError> {
        let text = fs::read_to_string(path)?;
        Ok(Self {
            params: parse_properties(&text)?,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Integer read; `default` is used only when the key is absent
    pub fn get_int(&self, key: &str, default: i32) -> Result<i32, ParamError> {
        match self.get(key) {
            Some(raw) => value::parse_int(key, raw),
            None => Ok(default),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Replace the whole parameter set
    pub fn replace_all(&mut self, params: ParamMap) {
        self.params = params;
    }

    /// Merge `params` in; later values win
    pub fn extend(&mut self, params: ParamMap) {
        self.params.extend(params);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn as_map(&self) -> &ParamMap {
        &self.params
    }

    pub fn into_map(self) -> ParamMap {
        self.params
    }
}

impl From<ParamMap> for ParameterStore {
    fn from(params: ParamMap) -> Self {
        Self { params }
    }
}

/// Parse `key=value` / `key: value` lines
///
/// Blank lines and lines starting with `#` or `!` are skipped. Keys and
/// values are trimmed; the first `=` or `:` separates them, so values may
/// contain either character.
pub fn parse_properties(text: &str) -> Result<ParamMap, ParamError> {
    let mut params = ParamMap::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let Some(split) = line.find(['=', ':']) else {
            return Err(ParamError::InvalidProperties {
                line: index + 1,
                details: format!("missing '=' or ':' in '{line}'"),
            });
        };

        let key = line[..split].trim();
        if key.is_empty() {
            return Err(ParamError::InvalidProperties {
                line: index + 1,
                details: "empty key".into(),
            });
        }
        params.insert(key.to_string(), line[split + 1..].trim().to_string());
    }

    Ok(params)
}

/// Parse one `key=value` command-line assignment
pub fn parse_assignment(arg: &str) -> Result<(String, String), ParamError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ParamError::InvalidAssignment {
            arg: arg.to_string(),
        }),
    }
}

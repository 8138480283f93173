//! Constant renaming between an internal and an external naming domain
//!
//! The map is declared internal → external and its inverse is derived. A
//! constant without an entry passes through unchanged; a constant mapped
//! to the empty string has no counterpart and maps to `None`.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ConstantMap {
    to_external: HashMap<String, String>,
    to_internal: HashMap<String, String>,
}

impl ConstantMap {
    /// Build from internal → external pairs
    ///
    /// When several internal constants share one external name, the last
    /// pair wins in the inverse direction.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut to_external = HashMap::new();
        let mut to_internal = HashMap::new();
        for (internal, external) in pairs {
            let (internal, external): (String, String) = (internal.into(), external.into());
            to_internal.insert(external.clone(), internal.clone());
            to_external.insert(internal, external);
        }
        Self {
            to_external,
            to_internal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_external.is_empty()
    }

    /// Internal constant → external name
    pub fn to_external<'a>(&'a self, constant: &'a str) -> Option<&'a str> {
        lookup(&self.to_external, constant)
    }

    /// External name → internal constant
    pub fn to_internal<'a>(&'a self, constant: &'a str) -> Option<&'a str> {
        lookup(&self.to_internal, constant)
    }

    /// Rename the arguments of evidence rows into the internal domain
    ///
    /// The first element of each row (the predicate) is kept as is. Rows
    /// with any argument that has no internal counterpart are dropped.
    pub fn map_evidence(&self, rows: &[Vec<String>]) -> Vec<Vec<String>> {
        rows.iter()
            .filter_map(|row| {
                let Some((head, args)) = row.split_first() else {
                    return Some(Vec::new());
                };
                let mut mapped = Vec::with_capacity(row.len());
                mapped.push(head.clone());
                for arg in args {
                    mapped.push(self.to_internal(arg)?.to_string());
                }
                Some(mapped)
            })
            .collect()
    }
}

fn lookup<'a>(map: &'a HashMap<String, String>, constant: &'a str) -> Option<&'a str> {
    match map.get(constant) {
        None => Some(constant),
        Some(mapped) if mapped.is_empty() => None,
        Some(mapped) => Some(mapped),
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// String property bag passed alongside a target when requesting a handle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionOptions {
    properties: BTreeMap<String, String>,
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.properties.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Parse `key` as a number; `Ok(None)` when absent
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, String> {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| format!("option '{key}' = '{raw}' is not a valid integer: {e}"))
            })
            .transpose()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// `base` with these options laid over it
    pub fn overlaid_on(&self, base: &BTreeMap<String, String>) -> ConnectionOptions {
        let mut properties = base.clone();
        properties.extend(self.properties.clone());
        Self { properties }
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.properties
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConnectionOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

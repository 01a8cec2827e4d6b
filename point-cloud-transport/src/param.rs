//! Node parameters keyed by fully resolved names.

use std::{collections::HashMap, path::Path, sync::Arc};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use zenoh::Result;

#[derive(Debug, Clone, Default)]
pub struct Parameters {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON5 object whose keys are resolved parameter names.
    ///
    /// ```json5
    /// {
    ///   "/points/disable_pub_plugins": ["point_cloud_transport/lz4"],
    ///   "/listener/point_cloud_transport": "lz4",
    /// }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json5(&text)
    }

    pub fn from_json5(text: &str) -> Result<Self> {
        let values: HashMap<String, Value> = json5::from_str(text)
            .map_err(|e| zenoh::Error::from(format!("Failed to parse parameters: {e}")))?;
        for key in values.keys() {
            if !key.starts_with('/') {
                return Err(format!("Parameter '{key}' must be a resolved name").into());
            }
        }
        Ok(Self {
            values: Arc::new(RwLock::new(values)),
        })
    }

    pub fn set<K: Into<String>, V: serde::Serialize>(&self, name: K, value: V) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.values.write().insert(name.into(), value);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    /// Typed lookup. A value of the wrong type is treated as absent.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.values.read().get(name).cloned()?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("[PARAM] Ignoring parameter '{}': {}", name, e);
                None
            }
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        self.get(name).unwrap_or(default)
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn merge(&self, other: &Parameters) {
        let other = other.values.read().clone();
        self.values.write().extend(other);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let params = Parameters::new();
        params.set("/points/disable_pub_plugins", vec!["point_cloud_transport/lz4"]).unwrap();
        params.set("/node/point_cloud_transport", "raw").unwrap();

        let blacklist: Vec<String> = params.get("/points/disable_pub_plugins").unwrap();
        assert_eq!(blacklist, vec!["point_cloud_transport/lz4".to_string()]);
        assert_eq!(params.get_or("/node/point_cloud_transport", String::new()), "raw");
        assert_eq!(params.get::<u32>("/node/point_cloud_transport"), None);
        assert_eq!(params.get_or("/missing", 3u32), 3);
    }

    #[test]
    fn loads_json5() {
        let params = Parameters::from_json5(
            r#"{
                // comments are fine
                "/listener/point_cloud_transport": "lz4",
            }"#,
        )
        .unwrap();
        assert!(params.has("/listener/point_cloud_transport"));
        assert!(Parameters::from_json5(r#"{ "relative": 1 }"#).is_err());
    }

    #[test]
    fn clones_share_storage() {
        let a = Parameters::new();
        let b = a.clone();
        a.set("/x", 1).unwrap();
        assert_eq!(b.get::<i32>("/x"), Some(1));
    }
}

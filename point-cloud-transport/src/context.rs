use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use serde_json::json;
use zenoh::{Result, Session, Wait};

use crate::{Builder, node::NodeBuilder, param::Parameters};

const CONFIG_FILE_ENV: &str = "PCT_CONFIG_FILE";
const CONFIG_OVERRIDE_ENV: &str = "PCT_CONFIG_OVERRIDE";

/// Hands out node and endpoint ids unique within a context.
#[derive(Debug, Default)]
pub struct GlobalCounter(AtomicUsize);

impl GlobalCounter {
    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::AcqRel)
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    domain_id: usize,
    config_file: Option<PathBuf>,
    config_overrides: Vec<(String, serde_json::Value)>,
}

impl ContextBuilder {
    pub fn with_domain_id(mut self, domain_id: usize) -> Self {
        self.domain_id = domain_id;
        self
    }

    /// Load a zenoh configuration file.
    pub fn with_config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Override a single zenoh configuration key.
    ///
    /// ```ignore
    /// let ctx = ContextBuilder::default()
    ///     .with_json("scouting/multicast/enabled", json!(false))
    ///     .build()?;
    /// ```
    pub fn with_json<K: Into<String>, V: serde::Serialize>(mut self, key: K, value: V) -> Self {
        let key = key.into();
        match serde_json::to_value(&value) {
            Ok(value) => self.config_overrides.push((key, value)),
            Err(e) => tracing::warn!("[CTX] Dropping override '{}': {}", key, e),
        }
        self
    }

    pub fn disable_multicast_scouting(self) -> Self {
        self.with_json("scouting/multicast/enabled", json!(false))
    }

    pub fn with_connect_endpoints<I, S>(self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let endpoints: Vec<String> = endpoints.into_iter().map(|s| s.into()).collect();
        self.with_json("connect/endpoints", json!(endpoints))
    }

    /// `peer`, `client` or `router`.
    pub fn with_mode<S: Into<String>>(self, mode: S) -> Self {
        self.with_json("mode", json!(mode.into()))
    }
}

/// Parse `PCT_CONFIG_OVERRIDE`, a `;`-separated list of `key=value` pairs
/// whose values are JSON5.
///
/// `mode="client";connect/endpoints=["tcp/192.168.1.1:7447"]`
pub(crate) fn parse_overrides(text: &str) -> Result<Vec<(String, serde_json::Value)>> {
    let mut overrides = Vec::new();
    for pair in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(
                format!("Invalid {CONFIG_OVERRIDE_ENV} entry '{pair}', expected 'key=value'").into(),
            );
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid {CONFIG_OVERRIDE_ENV} entry '{pair}', empty key").into());
        }
        let value = json5::from_str::<serde_json::Value>(value.trim()).map_err(|e| {
            format!("Failed to parse {CONFIG_OVERRIDE_ENV} value for '{key}': {e}")
        })?;
        overrides.push((key.to_string(), value));
    }
    Ok(overrides)
}

impl Builder for ContextBuilder {
    type Output = Context;

    fn build(mut self) -> Result<Context> {
        let mut config = if let Some(ref config_file) = self.config_file {
            zenoh::Config::from_file(config_file)?
        } else if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            zenoh::Config::from_file(path)?
        } else {
            zenoh::Config::default()
        };

        // Builder overrides are applied after the environment ones and win.
        let mut overrides = match std::env::var(CONFIG_OVERRIDE_ENV) {
            Ok(text) => {
                tracing::debug!("[CTX] Applying {}: {}", CONFIG_OVERRIDE_ENV, text);
                parse_overrides(&text)?
            }
            Err(_) => Vec::new(),
        };
        overrides.append(&mut self.config_overrides);

        for (key, value) in overrides {
            let value_str = serde_json::to_string(&value)?;
            config.insert_json5(&key, &value_str).map_err(|e| {
                format!("Failed to apply config override '{key}' = '{value_str}': {e}")
            })?;
        }

        let session = zenoh::open(config).wait()?;
        tracing::info!("[CTX] Session opened: zid={}", session.zid());

        Ok(Context {
            session: Arc::new(session),
            counter: Arc::new(GlobalCounter::default()),
            domain_id: self.domain_id,
        })
    }
}

pub struct Context {
    session: Arc<Session>,
    counter: Arc<GlobalCounter>,
    domain_id: usize,
}

impl Context {
    pub fn create_node<S: AsRef<str>>(&self, name: S) -> NodeBuilder {
        NodeBuilder {
            domain_id: self.domain_id,
            name: name.as_ref().to_owned(),
            namespace: String::new(),
            parameters: Parameters::new(),
            session: self.session.clone(),
            counter: self.counter.clone(),
        }
    }

    pub fn domain_id(&self) -> usize {
        self.domain_id
    }

    pub fn shutdown(&self) -> Result<()> {
        self.session.close().wait()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_override_pairs() {
        let overrides = parse_overrides(
            r#"mode="client"; connect/endpoints=["tcp/192.168.1.1:7447"];scouting/multicast/enabled=false;"#,
        )
        .unwrap();
        assert_eq!(
            overrides,
            vec![
                ("mode".to_string(), json!("client")),
                (
                    "connect/endpoints".to_string(),
                    json!(["tcp/192.168.1.1:7447"])
                ),
                ("scouting/multicast/enabled".to_string(), json!(false)),
            ]
        );
        assert!(parse_overrides("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_overrides() {
        assert!(parse_overrides("mode").is_err());
        assert!(parse_overrides("=\"peer\"").is_err());
        assert!(parse_overrides("mode=client").is_err());
        assert!(parse_overrides(r#"mode="peer";listen"#).is_err());
    }

    #[test]
    fn builder_collects_json_overrides() {
        let builder = ContextBuilder::default()
            .with_mode("client")
            .with_connect_endpoints(["tcp/127.0.0.1:7447"])
            .disable_multicast_scouting()
            .with_domain_id(3);
        assert_eq!(builder.domain_id, 3);
        assert_eq!(builder.config_overrides[0], ("mode".to_string(), json!("client")));
        assert_eq!(
            builder.config_overrides[1].1,
            json!(["tcp/127.0.0.1:7447"])
        );
        assert_eq!(
            builder.config_overrides[2],
            ("scouting/multicast/enabled".to_string(), json!(false))
        );
    }
}

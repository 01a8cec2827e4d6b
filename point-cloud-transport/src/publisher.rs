use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    error::{TransportError, TransportResult},
    loader::PubLoader,
    msg::PointCloud2,
    node::Node,
    plugin::{PublisherPlugin, short_transport_name, transport_of_lookup_name},
};

pub use crate::plugin::AdvertiseOptions;

/// Parameter under the base topic listing transports not to advertise.
pub const DISABLE_PUB_PLUGINS: &str = "disable_pub_plugins";

struct Impl {
    base_topic: String,
    plugins: Mutex<Vec<Box<dyn PublisherPlugin>>>,
    unadvertised: AtomicBool,
}

impl Impl {
    fn shutdown(&self) {
        if self.unadvertised.swap(true, Ordering::AcqRel) {
            return;
        }
        // Matching callbacks may call back into us while plugins undeclare.
        let plugins = std::mem::take(&mut *self.plugins.lock());
        for mut plugin in plugins {
            plugin.shutdown();
        }
        debug!("[PCT] Unadvertised {}", self.base_topic);
    }
}

impl Drop for Impl {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Advertises a base topic on every loadable transport.
///
/// Clones share the same plugins; the last clone to go away unadvertises.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<Impl>,
}

impl Publisher {
    pub fn new(
        node: &Node,
        base_topic: &str,
        queue_size: usize,
        options: AdvertiseOptions,
        loader: &PubLoader,
    ) -> TransportResult<Self> {
        let base_topic = node.resolve_name(base_topic)?;

        let blacklist: HashSet<String> = node
            .param::<Vec<String>>(&format!("{base_topic}/{DISABLE_PUB_PLUGINS}"))
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut plugins: Vec<Box<dyn PublisherPlugin>> = Vec::new();
        for lookup_name in loader.declared_classes() {
            let transport = transport_of_lookup_name(&lookup_name);
            let disabled =
                blacklist.contains(transport) || blacklist.contains(short_transport_name(transport));
            if disabled {
                debug!("[PCT] Skipping disabled transport {}", transport);
                continue;
            }
            let loaded = loader
                .create_instance(&lookup_name)
                .map_err(TransportError::from)
                .and_then(|mut plugin| {
                    plugin.advertise(node, &base_topic, queue_size, &options)?;
                    Ok(plugin)
                });
            match loaded {
                Ok(plugin) => plugins.push(plugin),
                Err(e) => warn!("[PCT] Failed to load plugin {}: {}", lookup_name, e),
            }
        }

        if plugins.is_empty() {
            return Err(TransportError::NoPluginsLoaded { base_topic });
        }
        info!(
            "[PCT] Advertised {} on {} transport(s)",
            base_topic,
            plugins.len()
        );

        Ok(Self {
            inner: Arc::new(Impl {
                base_topic,
                plugins: Mutex::new(plugins),
                unadvertised: AtomicBool::new(false),
            }),
        })
    }

    /// Resolved base topic.
    pub fn topic(&self) -> &str {
        &self.inner.base_topic
    }

    /// Subscribers across all transports.
    pub fn num_subscribers(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        self.inner
            .plugins
            .lock()
            .iter()
            .map(|p| p.num_subscribers())
            .sum()
    }

    /// Short names of the advertised transports. Empty after shutdown.
    pub fn transports(&self) -> Vec<String> {
        self.inner
            .plugins
            .lock()
            .iter()
            .map(|p| p.transport_name().to_string())
            .collect()
    }

    /// Transport topics, in the same order as [`Publisher::transports`].
    pub fn transport_topics(&self) -> Vec<String> {
        self.inner.plugins.lock().iter().map(|p| p.topic()).collect()
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.unadvertised.load(Ordering::Acquire)
    }

    /// Publish on every transport that has subscribers, or that is latched.
    ///
    /// A failing transport does not stop the others; the first error is returned.
    #[tracing::instrument(name = "pct_publish", skip(self, msg), fields(
        topic = %self.inner.base_topic,
        points = msg.point_count()
    ))]
    pub fn publish(&self, msg: &PointCloud2) -> TransportResult<()> {
        if !self.is_valid() {
            return Err(TransportError::InvalidPublisher);
        }
        let mut first_error = None;
        for plugin in self.inner.plugins.lock().iter() {
            if plugin.num_subscribers() == 0 && !plugin.is_latched() {
                continue;
            }
            if let Err(e) = plugin.publish(msg) {
                error!("[PCT] {} failed to publish: {}", plugin.lookup_name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Unadvertise every transport. Later `publish` calls fail.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.inner.base_topic)
            .field("valid", &self.is_valid())
            .finish()
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::{TransportError, TransportResult},
    hints::TransportHints,
    loader::SubLoader,
    msg::PointCloud2,
    node::Node,
    plugin::{
        SubscriberPlugin, short_transport_name, subscriber_lookup_name, transport_of_lookup_name,
    },
    topic_name,
};

struct Impl {
    base_topic: String,
    transport: String,
    transport_topic: String,
    plugin: Mutex<Option<Box<dyn SubscriberPlugin>>>,
    unsubscribed: AtomicBool,
}

impl Impl {
    fn shutdown(&self) {
        if self.unsubscribed.swap(true, Ordering::AcqRel) {
            return;
        }
        // The plugin joins its dispatcher, whose callback may call back into us.
        let plugin = self.plugin.lock().take();
        if let Some(mut plugin) = plugin {
            plugin.shutdown();
        }
        debug!("[PCT] Unsubscribed {} ({})", self.base_topic, self.transport);
    }
}

impl Drop for Impl {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Receives clouds on a base topic through a single transport.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<Impl>,
}

impl Subscriber {
    pub fn new<F>(
        node: &Node,
        base_topic: &str,
        queue_size: usize,
        callback: F,
        hints: &TransportHints,
        loader: &SubLoader,
    ) -> TransportResult<Self>
    where
        F: Fn(Arc<PointCloud2>) + Send + Sync + 'static,
    {
        let base_topic = node.resolve_name(base_topic)?;
        let transport = short_transport_name(&hints.transport(node)).to_string();
        warn_if_transport_suffixed(&base_topic, loader);

        let lookup_name = subscriber_lookup_name(&transport);
        let mut plugin =
            loader
                .create_instance(&lookup_name)
                .map_err(|e| TransportError::TransportLoad {
                    transport: transport.clone(),
                    reason: e.to_string(),
                })?;
        plugin.subscribe(node, &base_topic, queue_size, Arc::new(callback))?;
        let transport_topic = plugin.topic();
        info!(
            "[PCT] Subscribed to {} through {}",
            transport_topic, transport
        );

        Ok(Self {
            inner: Arc::new(Impl {
                base_topic,
                transport,
                transport_topic,
                plugin: Mutex::new(Some(plugin)),
                unsubscribed: AtomicBool::new(false),
            }),
        })
    }

    /// Resolved base topic.
    pub fn topic(&self) -> &str {
        &self.inner.base_topic
    }

    /// Topic the transport actually listens on.
    pub fn transport_topic(&self) -> &str {
        &self.inner.transport_topic
    }

    pub fn transport(&self) -> &str {
        &self.inner.transport
    }

    pub fn num_publishers(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        self.inner
            .plugin
            .lock()
            .as_ref()
            .map_or(0, |p| p.num_publishers())
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.unsubscribed.load(Ordering::Acquire)
    }

    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("topic", &self.inner.base_topic)
            .field("transport", &self.inner.transport)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// `/points/lz4` was most likely meant as `/points` with the `lz4` transport.
fn warn_if_transport_suffixed(base_topic: &str, loader: &SubLoader) {
    let last = topic_name::last_segment(base_topic);
    let names_transport = loader.declared_classes().iter().any(|lookup_name| {
        short_transport_name(transport_of_lookup_name(lookup_name)) == last
    });
    if names_transport {
        warn!(
            "[PCT] Subscribing to {} whose last segment names a transport; \
             pass the base topic and select the transport with TransportHints",
            base_topic
        );
    }
}

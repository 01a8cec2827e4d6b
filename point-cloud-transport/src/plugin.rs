//! Interfaces every transport implements, one per direction.

use std::sync::Arc;

use crate::{error::TransportResult, msg::PointCloud2, node::Node};

pub const PACKAGE: &str = "point_cloud_transport";
pub const PUBLISHER_BASE_CLASS: &str = "point_cloud_transport::PublisherPlugin";
pub const SUBSCRIBER_BASE_CLASS: &str = "point_cloud_transport::SubscriberPlugin";

const PUB_SUFFIX: &str = "_pub";
const SUB_SUFFIX: &str = "_sub";

/// `raw` -> `point_cloud_transport/raw_pub`
pub fn publisher_lookup_name(transport: &str) -> String {
    format!("{PACKAGE}/{transport}{PUB_SUFFIX}")
}

/// `raw` -> `point_cloud_transport/raw_sub`
pub fn subscriber_lookup_name(transport: &str) -> String {
    format!("{PACKAGE}/{transport}{SUB_SUFFIX}")
}

/// Strip the trailing `_pub` or `_sub` of a class lookup name.
pub fn transport_of_lookup_name(lookup_name: &str) -> &str {
    lookup_name
        .strip_suffix(SUB_SUFFIX)
        .or_else(|| lookup_name.strip_suffix(PUB_SUFFIX))
        .unwrap_or(lookup_name)
}

/// `point_cloud_transport/lz4` -> `lz4`; names from other packages are kept whole.
pub fn short_transport_name(name: &str) -> &str {
    name.strip_prefix(PACKAGE)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name)
}

/// A subscriber that just appeared on, or left, one transport topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberLink {
    pub topic: String,
    pub transport: String,
    pub subscriber_node: String,
    pub subscriber_namespace: String,
    /// Subscribers on this transport topic after the change.
    pub num_subscribers: usize,
}

pub type SubscriberStatusCallback = Arc<dyn Fn(&SubscriberLink) + Send + Sync>;
pub type PointCloudCallback = Arc<dyn Fn(Arc<PointCloud2>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct AdvertiseOptions {
    pub connect_cb: Option<SubscriberStatusCallback>,
    pub disconnect_cb: Option<SubscriberStatusCallback>,
    pub latch: bool,
}

impl AdvertiseOptions {
    pub fn latched() -> Self {
        Self {
            latch: true,
            ..Default::default()
        }
    }

    pub fn on_connect<F>(mut self, cb: F) -> Self
    where
        F: Fn(&SubscriberLink) + Send + Sync + 'static,
    {
        self.connect_cb = Some(Arc::new(cb));
        self
    }

    pub fn on_disconnect<F>(mut self, cb: F) -> Self
    where
        F: Fn(&SubscriberLink) + Send + Sync + 'static,
    {
        self.disconnect_cb = Some(Arc::new(cb));
        self
    }
}

impl std::fmt::Debug for AdvertiseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvertiseOptions")
            .field("connect_cb", &self.connect_cb.is_some())
            .field("disconnect_cb", &self.disconnect_cb.is_some())
            .field("latch", &self.latch)
            .finish()
    }
}

pub trait PublisherPlugin: Send + Sync {
    /// Short name such as `raw`.
    fn transport_name(&self) -> &str;

    fn lookup_name(&self) -> String {
        publisher_lookup_name(self.transport_name())
    }

    /// `base_topic` is already resolved.
    fn advertise(
        &mut self,
        node: &Node,
        base_topic: &str,
        queue_size: usize,
        options: &AdvertiseOptions,
    ) -> TransportResult<()>;

    /// Empty until advertised.
    fn topic(&self) -> String;

    fn num_subscribers(&self) -> usize;

    fn is_latched(&self) -> bool;

    fn publish(&self, msg: &PointCloud2) -> TransportResult<()>;

    fn shutdown(&mut self);
}

pub trait SubscriberPlugin: Send + Sync {
    fn transport_name(&self) -> &str;

    fn lookup_name(&self) -> String {
        subscriber_lookup_name(self.transport_name())
    }

    /// `base_topic` is already resolved.
    fn subscribe(
        &mut self,
        node: &Node,
        base_topic: &str,
        queue_size: usize,
        callback: PointCloudCallback,
    ) -> TransportResult<()>;

    fn topic(&self) -> String;

    fn num_publishers(&self) -> usize;

    fn shutdown(&mut self);
}

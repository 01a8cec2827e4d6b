use std::sync::Arc;

use crate::{
    error::TransportResult,
    hints::TransportHints,
    loader::{PubLoader, SubLoader},
    msg::PointCloud2,
    node::Node,
    plugin::transport_of_lookup_name,
    publisher::{AdvertiseOptions, Publisher},
    subscriber::Subscriber,
};

/// Entry point: advertise and subscribe to point clouds on behalf of a node.
///
/// ```no_run
/// use point_cloud_transport::{Builder, PointCloudTransport, TransportHints};
/// use point_cloud_transport::context::ContextBuilder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let ctx = ContextBuilder::default().build()?;
/// let node = ctx.create_node("listener").build()?;
/// let pct = PointCloudTransport::new(node);
/// let _sub = pct.subscribe("points", 10, |cloud| {
///     println!("{} points", cloud.point_count());
/// }, TransportHints::new("lz4"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PointCloudTransport {
    node: Node,
    pub_loader: Arc<PubLoader>,
    sub_loader: Arc<SubLoader>,
}

impl PointCloudTransport {
    pub fn new(node: Node) -> Self {
        Self::with_loaders(node, PubLoader::with_builtin(), SubLoader::with_builtin())
    }

    pub fn with_loaders(node: Node, pub_loader: PubLoader, sub_loader: SubLoader) -> Self {
        Self {
            node,
            pub_loader: Arc::new(pub_loader),
            sub_loader: Arc::new(sub_loader),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn pub_loader(&self) -> &PubLoader {
        &self.pub_loader
    }

    pub fn sub_loader(&self) -> &SubLoader {
        &self.sub_loader
    }

    pub fn advertise(
        &self,
        base_topic: &str,
        queue_size: usize,
        latch: bool,
    ) -> TransportResult<Publisher> {
        let options = AdvertiseOptions {
            latch,
            ..Default::default()
        };
        self.advertise_with(base_topic, queue_size, options)
    }

    pub fn advertise_with(
        &self,
        base_topic: &str,
        queue_size: usize,
        options: AdvertiseOptions,
    ) -> TransportResult<Publisher> {
        Publisher::new(
            &self.node,
            base_topic,
            queue_size,
            options,
            &self.pub_loader,
        )
    }

    pub fn subscribe<F>(
        &self,
        base_topic: &str,
        queue_size: usize,
        callback: F,
        hints: TransportHints,
    ) -> TransportResult<Subscriber>
    where
        F: Fn(Arc<PointCloud2>) + Send + Sync + 'static,
    {
        Subscriber::new(
            &self.node,
            base_topic,
            queue_size,
            callback,
            &hints,
            &self.sub_loader,
        )
    }

    /// Every transport the subscriber loader knows about, e.g.
    /// `point_cloud_transport/raw`.
    pub fn declared_transports(&self) -> Vec<String> {
        self.sub_loader
            .declared_classes()
            .iter()
            .map(|lookup_name| transport_of_lookup_name(lookup_name).to_string())
            .collect()
    }

    /// The declared transports whose subscriber plugin can be instantiated.
    pub fn loadable_transports(&self) -> Vec<String> {
        self.sub_loader
            .declared_classes()
            .iter()
            .filter(|lookup_name| self.sub_loader.create_instance(lookup_name).is_ok())
            .map(|lookup_name| transport_of_lookup_name(lookup_name).to_string())
            .collect()
    }
}

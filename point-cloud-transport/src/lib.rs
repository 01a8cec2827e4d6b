//! Pluggable transports for `PointCloud2` over a zenoh-backed node layer.
//!
//! A [`Publisher`] advertises one topic per loadable transport, a
//! [`Subscriber`] picks a single transport through [`TransportHints`], and
//! [`PointCloudTransport`] ties both to a node and a pair of class loaders.

pub mod attachment;
pub mod context;
pub mod entity;
pub mod error;
pub mod hints;
pub mod loader;
pub mod msg;
pub mod node;
pub mod param;
pub mod plugin;
pub mod publisher;
pub mod pubsub;
pub mod qos;
pub mod queue;
pub mod simple;
pub mod subscriber;
pub mod topic_name;
pub mod transport;
pub mod transports;

pub use zenoh::Result;

pub use error::{CodecError, LoaderError, TransportError, TransportResult};
pub use hints::TransportHints;
pub use loader::{ClassLoader, PubLoader, SubLoader};
pub use msg::{CompressedPointCloud2, Header, PointCloud2, PointField, PointFieldType, Time};
pub use publisher::{AdvertiseOptions, Publisher};
pub use subscriber::Subscriber;
pub use transport::PointCloudTransport;

pub trait Builder {
    type Output;
    fn build(self) -> Result<Self::Output>;
}

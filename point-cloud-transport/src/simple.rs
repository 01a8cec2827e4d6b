//! Plugins built from a [`Codec`]: one raw endpoint per transport topic,
//! with the codec turning clouds into payloads and back.

use std::sync::Arc;

use tracing::{error, trace};

use crate::{
    Builder,
    entity::TypeInfo,
    error::{CodecError, TransportError, TransportResult},
    msg::PointCloud2,
    node::Node,
    plugin::{
        AdvertiseOptions, PointCloudCallback, PublisherPlugin, SubscriberLink,
        SubscriberPlugin, SubscriberStatusCallback,
    },
    pubsub::{MatchingCallback, MatchingEvent, RawPublisher, RawSubscriber},
    qos::QosProfile,
    topic_name,
};

pub trait Codec: Send + Sync + 'static {
    fn transport_name(&self) -> &str;

    /// Type announced on the transport topic.
    fn wire_type(&self) -> TypeInfo;

    /// Topic used for `base_topic`; `<base_topic>/<transport>` unless overridden.
    fn topic_for(&self, base_topic: &str) -> String {
        topic_name::transport_topic(base_topic, self.transport_name())
    }

    fn encode(&self, msg: &PointCloud2) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, payload: &[u8]) -> Result<PointCloud2, CodecError>;
}

fn status_callback(transport: String, cb: SubscriberStatusCallback) -> MatchingCallback {
    Arc::new(move |event: &MatchingEvent| {
        cb(&SubscriberLink {
            topic: event.topic.clone(),
            transport: transport.clone(),
            subscriber_node: event.remote.node_name.clone(),
            subscriber_namespace: event.remote.namespace.clone(),
            num_subscribers: event.current_count,
        })
    })
}

pub struct SimplePublisherPlugin<C: Codec> {
    codec: C,
    publisher: Option<RawPublisher>,
}

impl<C: Codec> SimplePublisherPlugin<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            publisher: None,
        }
    }
}

impl<C: Codec> PublisherPlugin for SimplePublisherPlugin<C> {
    fn transport_name(&self) -> &str {
        self.codec.transport_name()
    }

    fn advertise(
        &mut self,
        node: &Node,
        base_topic: &str,
        queue_size: usize,
        options: &AdvertiseOptions,
    ) -> TransportResult<()> {
        let transport = self.codec.transport_name().to_string();
        let on_match = options
            .connect_cb
            .clone()
            .map(|cb| status_callback(transport.clone(), cb));
        let on_unmatch = options
            .disconnect_cb
            .clone()
            .map(|cb| status_callback(transport.clone(), cb));

        let publisher = node
            .create_pub(&self.codec.topic_for(base_topic), self.codec.wire_type())
            .with_qos(QosProfile::from_queue_size(queue_size, options.latch))
            .with_matching_callbacks(on_match, on_unmatch)
            .build()?;
        self.publisher = Some(publisher);
        Ok(())
    }

    fn topic(&self) -> String {
        self.publisher
            .as_ref()
            .map(|p| p.topic().to_string())
            .unwrap_or_default()
    }

    fn num_subscribers(&self) -> usize {
        self.publisher.as_ref().map_or(0, |p| p.num_subscribers())
    }

    fn is_latched(&self) -> bool {
        self.publisher.as_ref().is_some_and(|p| p.is_latched())
    }

    fn publish(&self, msg: &PointCloud2) -> TransportResult<()> {
        let publisher = self
            .publisher
            .as_ref()
            .filter(|p| p.is_valid())
            .ok_or(TransportError::InvalidPublisher)?;
        let payload = self.codec.encode(msg)?;
        trace!(
            "[PCT] {} encoded {} bytes into {}",
            self.codec.transport_name(),
            msg.data.len(),
            payload.len()
        );
        publisher.publish(payload)?;
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(publisher) = self.publisher.take() {
            publisher.shutdown();
        }
    }
}

pub struct SimpleSubscriberPlugin<C: Codec> {
    codec: Arc<C>,
    subscriber: Option<RawSubscriber>,
}

impl<C: Codec> SimpleSubscriberPlugin<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
            subscriber: None,
        }
    }
}

impl<C: Codec> SubscriberPlugin for SimpleSubscriberPlugin<C> {
    fn transport_name(&self) -> &str {
        self.codec.transport_name()
    }

    fn subscribe(
        &mut self,
        node: &Node,
        base_topic: &str,
        queue_size: usize,
        callback: PointCloudCallback,
    ) -> TransportResult<()> {
        let codec = self.codec.clone();
        let subscriber = node
            .create_sub(&self.codec.topic_for(base_topic), self.codec.wire_type())
            .with_qos(QosProfile::from_queue_size(queue_size, false))
            .build_with_handler(move |payload| match codec.decode(payload) {
                Ok(cloud) => callback(Arc::new(cloud)),
                Err(e) => error!("[PCT] {} failed to decode: {}", codec.transport_name(), e),
            })?;
        self.subscriber = Some(subscriber);
        Ok(())
    }

    fn topic(&self) -> String {
        self.subscriber
            .as_ref()
            .map(|s| s.topic().to_string())
            .unwrap_or_default()
    }

    fn num_publishers(&self) -> usize {
        self.subscriber.as_ref().map_or(0, |s| s.num_publishers())
    }

    fn shutdown(&mut self) {
        if let Some(subscriber) = self.subscriber.take() {
            subscriber.shutdown();
        }
    }
}

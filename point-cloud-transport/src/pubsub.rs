//! Byte-level publishers and subscribers.
//!
//! Transport plugins sit on top of these: they encode a `PointCloud2` into a
//! payload and hand it to a [`RawPublisher`], or decode what a
//! [`RawSubscriber`] delivers. Both endpoints announce themselves with a
//! liveliness token and watch the tokens of their peers to keep a matching
//! count.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use zenoh::bytes::ZBytes;
use zenoh::liveliness::LivelinessToken;
use zenoh::pubsub::Subscriber;
use zenoh::query::{ConsolidationMode, QueryTarget, Queryable};
use zenoh::sample::{Sample, SampleKind};
use zenoh::{Result, Session, Wait};

use crate::attachment::{Attachment, GidArray};
use crate::entity::{EndpointEntity, RemoteEndpoint};
use crate::qos::{QosProfile, QosReliability};
use crate::queue::BoundedQueue;
use crate::topic_name;

/// Passed to matching callbacks when a peer endpoint appears or disappears.
#[derive(Debug, Clone)]
pub struct MatchingEvent {
    pub topic: String,
    pub remote: RemoteEndpoint,
    /// Matching peers after the change.
    pub current_count: usize,
}

pub type MatchingCallback = Arc<dyn Fn(&MatchingEvent) + Send + Sync>;

struct MatchingState {
    topic: String,
    peers: Mutex<HashSet<String>>,
    on_match: Option<MatchingCallback>,
    on_unmatch: Option<MatchingCallback>,
}

impl MatchingState {
    fn new(
        topic: String,
        on_match: Option<MatchingCallback>,
        on_unmatch: Option<MatchingCallback>,
    ) -> Self {
        Self {
            topic,
            peers: Mutex::new(HashSet::new()),
            on_match,
            on_unmatch,
        }
    }

    fn count(&self) -> usize {
        self.peers.lock().len()
    }

    fn on_sample(&self, sample: &Sample) {
        let key = sample.key_expr().as_str();
        let (changed, current_count, callback) = {
            let mut peers = self.peers.lock();
            match sample.kind() {
                SampleKind::Put => (peers.insert(key.to_string()), peers.len(), &self.on_match),
                SampleKind::Delete => (peers.remove(key), peers.len(), &self.on_unmatch),
            }
        };
        if !changed {
            return;
        }
        trace!("[MATCH] {} peers on {}", current_count, self.topic);

        let (Some(callback), Some(remote)) = (callback, RemoteEndpoint::parse(key)) else {
            return;
        };
        callback(&MatchingEvent {
            topic: self.topic.clone(),
            remote,
            current_count,
        });
    }
}

fn declare_matching_listener(
    session: &Session,
    entity: &EndpointEntity,
    state: Arc<MatchingState>,
) -> Result<Subscriber<()>> {
    let key_expr = entity.peer_key_expr()?;
    debug!("[MATCH] Watching {}", key_expr);
    session
        .liveliness()
        .declare_subscriber(key_expr)
        .history(true)
        .callback(move |sample| state.on_sample(&sample))
        .wait()
}

fn resolve_entity_topic(entity: &mut EndpointEntity) -> Result<()> {
    entity.topic = topic_name::resolve_name(
        &entity.topic,
        &entity.node.namespace,
        &entity.node.name,
    )?;
    Ok(())
}

pub struct RawPublisherBuilder {
    entity: EndpointEntity,
    session: Arc<Session>,
    on_match: Option<MatchingCallback>,
    on_unmatch: Option<MatchingCallback>,
}

impl RawPublisherBuilder {
    pub(crate) fn new(entity: EndpointEntity, session: Arc<Session>) -> Self {
        Self {
            entity,
            session,
            on_match: None,
            on_unmatch: None,
        }
    }

    pub fn with_qos(mut self, qos: QosProfile) -> Self {
        self.entity.qos = qos;
        self
    }

    /// Callbacks fired when a matching subscriber appears or disappears.
    pub fn with_matching_callbacks(
        mut self,
        on_match: Option<MatchingCallback>,
        on_unmatch: Option<MatchingCallback>,
    ) -> Self {
        self.on_match = on_match;
        self.on_unmatch = on_unmatch;
        self
    }
}

impl crate::Builder for RawPublisherBuilder {
    type Output = RawPublisher;

    #[tracing::instrument(name = "pub_build", skip(self), fields(
        topic = %self.entity.topic,
        qos = %self.entity.qos
    ))]
    fn build(mut self) -> Result<RawPublisher> {
        resolve_entity_topic(&mut self.entity)?;
        let key_expr = self.entity.topic_key_expr()?;
        debug!("[PUB] Key expression: {}", key_expr);

        let congestion_control = match self.entity.qos.reliability {
            QosReliability::Reliable => zenoh::qos::CongestionControl::Block,
            QosReliability::BestEffort => zenoh::qos::CongestionControl::Drop,
        };
        let publisher = self
            .session
            .declare_publisher(key_expr.clone())
            .congestion_control(congestion_control)
            .wait()?;

        let latched: Arc<Mutex<Option<(ZBytes, ZBytes)>>> = Arc::new(Mutex::new(None));
        let queryable = if self.entity.qos.is_latched() {
            let cache = latched.clone();
            let reply_key = key_expr.clone();
            let queryable = self
                .session
                .declare_queryable(&key_expr)
                .callback(move |query| {
                    let Some((payload, attachment)) = cache.lock().clone() else {
                        return;
                    };
                    if let Err(e) = query.reply(&reply_key, payload).attachment(attachment).wait() {
                        warn!("[PUB] Failed to serve latched sample: {}", e);
                    }
                })
                .wait()?;
            Some(queryable)
        } else {
            None
        };

        let matching = Arc::new(MatchingState::new(
            self.entity.topic.clone(),
            self.on_match,
            self.on_unmatch,
        ));
        let matching_listener =
            declare_matching_listener(&self.session, &self.entity, matching.clone())?;

        let lv_token = self
            .session
            .liveliness()
            .declare_token(self.entity.lv_token_key_expr()?)
            .wait()?;
        let gid = self.entity.gid()?;

        info!("[PUB] Publisher ready: topic={}", self.entity.topic);

        Ok(RawPublisher {
            entity: self.entity,
            sn: AtomicI64::new(0),
            gid,
            latched,
            matching,
            handles: Mutex::new(Some(PublisherHandles {
                publisher,
                _queryable: queryable,
                _matching_listener: matching_listener,
                _lv_token: lv_token,
            })),
        })
    }
}

struct PublisherHandles {
    publisher: zenoh::pubsub::Publisher<'static>,
    _queryable: Option<Queryable<()>>,
    _matching_listener: Subscriber<()>,
    _lv_token: LivelinessToken,
}

pub struct RawPublisher {
    pub entity: EndpointEntity,
    sn: AtomicI64,
    gid: GidArray,
    latched: Arc<Mutex<Option<(ZBytes, ZBytes)>>>,
    matching: Arc<MatchingState>,
    handles: Mutex<Option<PublisherHandles>>,
}

impl RawPublisher {
    pub fn topic(&self) -> &str {
        &self.entity.topic
    }

    pub fn num_subscribers(&self) -> usize {
        self.matching.count()
    }

    pub fn is_latched(&self) -> bool {
        self.entity.qos.is_latched()
    }

    pub fn is_valid(&self) -> bool {
        self.handles.lock().is_some()
    }

    #[tracing::instrument(name = "publish", skip(self, payload), fields(
        topic = %self.entity.topic,
        payload_len = tracing::field::Empty
    ))]
    pub fn publish(&self, payload: impl Into<ZBytes>) -> Result<()> {
        let payload: ZBytes = payload.into();
        tracing::Span::current().record("payload_len", payload.len());

        let handles = self.handles.lock();
        let handles = handles
            .as_ref()
            .ok_or_else(|| zenoh::Error::from(format!("publisher on {} is shut down", self.entity.topic)))?;

        let sn = self.sn.fetch_add(1, Ordering::Relaxed);
        let attachment = ZBytes::from(Attachment::new(sn, self.gid));
        if self.is_latched() {
            *self.latched.lock() = Some((payload.clone(), attachment.clone()));
        }
        trace!("[PUB] sn={}", sn);
        handles.publisher.put(payload).attachment(attachment).wait()
    }

    /// Undeclare everything. Calling it again does nothing.
    pub fn shutdown(&self) {
        if self.handles.lock().take().is_some() {
            self.latched.lock().take();
            debug!("[PUB] Shut down {}", self.entity.topic);
        }
    }
}

impl Drop for RawPublisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Counters kept by a subscriber.
#[derive(Debug, Default)]
pub struct SubscriberStats {
    received: AtomicU64,
    lost: AtomicU64,
    overflowed: AtomicU64,
    last_sn: Mutex<HashMap<GidArray, i64>>,
}

impl SubscriberStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Samples missing from a publisher's sequence.
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    /// Samples dropped because the queue was full.
    pub fn overflowed(&self) -> u64 {
        self.overflowed.load(Ordering::Relaxed)
    }

    /// Record a sample. Returns `false` for a sample already seen from the
    /// same source, such as a latched replay of a live sample.
    fn track(&self, attachment: Option<&ZBytes>) -> bool {
        let Some(att) = attachment.and_then(|a| Attachment::try_from(a).ok()) else {
            self.received.fetch_add(1, Ordering::Relaxed);
            return true;
        };
        let mut last = self.last_sn.lock();
        let sn = att.sequence_number;
        match last.get(&att.source_gid).copied() {
            Some(prev) if sn <= prev => return false,
            Some(prev) => {
                let gap = sn.saturating_sub(prev).saturating_sub(1);
                if gap > 0 {
                    self.lost.fetch_add(gap as u64, Ordering::Relaxed);
                    debug!("[SUB] {} samples lost from {:02x?}", gap, &att.source_gid[..4]);
                }
            }
            None => {}
        }
        last.insert(att.source_gid, sn);
        self.received.fetch_add(1, Ordering::Relaxed);
        true
    }
}

pub type PayloadHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

pub struct RawSubscriberBuilder {
    entity: EndpointEntity,
    session: Arc<Session>,
}

impl RawSubscriberBuilder {
    pub(crate) fn new(entity: EndpointEntity, session: Arc<Session>) -> Self {
        Self { entity, session }
    }

    pub fn with_qos(mut self, qos: QosProfile) -> Self {
        self.entity.qos = qos;
        self
    }

    /// Deliver payloads to `handler` on a dedicated dispatcher thread.
    #[tracing::instrument(name = "sub_build", skip(self, handler), fields(
        topic = %self.entity.topic,
        qos = %self.entity.qos
    ))]
    pub fn build_with_handler<F>(mut self, handler: F) -> Result<RawSubscriber>
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        resolve_entity_topic(&mut self.entity)?;
        let key_expr = self.entity.topic_key_expr()?;
        debug!("[SUB] Key expression: {}", key_expr);

        let queue: Arc<BoundedQueue<Sample>> =
            Arc::new(BoundedQueue::new(self.entity.qos.history.depth()));
        let stats = Arc::new(SubscriberStats::default());

        let enqueue = {
            let queue = queue.clone();
            let stats = stats.clone();
            let topic = self.entity.topic.clone();
            move |sample: Sample| {
                if !stats.track(sample.attachment()) {
                    trace!("[SUB] Dropping replayed sample on {}", topic);
                    return;
                }
                if queue.push(sample) {
                    stats.overflowed.fetch_add(1, Ordering::Relaxed);
                    trace!("[SUB] Queue full on {}, dropped oldest", topic);
                }
            }
        };

        let subscriber = {
            let enqueue = enqueue.clone();
            self.session
                .declare_subscriber(key_expr.clone())
                .callback(move |sample| enqueue(sample))
                .wait()?
        };

        let matching = Arc::new(MatchingState::new(self.entity.topic.clone(), None, None));
        let matching_listener =
            declare_matching_listener(&self.session, &self.entity, matching.clone())?;

        let lv_token = self
            .session
            .liveliness()
            .declare_token(self.entity.lv_token_key_expr()?)
            .wait()?;

        // Latched publishers answer with their last sample.
        self.session
            .get(&key_expr)
            .target(QueryTarget::All)
            .consolidation(ConsolidationMode::None)
            .callback(move |reply| {
                if let Ok(sample) = reply.into_result() {
                    enqueue(sample);
                }
            })
            .wait()?;

        // Spawned last so that a failed declaration leaves no thread behind.
        // Samples received so far wait in the queue.
        let handler: PayloadHandler = Arc::new(handler);
        let dispatcher = {
            let queue = queue.clone();
            std::thread::Builder::new()
                .name(format!("pct-sub-{}", self.entity.id))
                .spawn(move || {
                    while let Some(sample) = queue.recv() {
                        handler(&sample.payload().to_bytes());
                    }
                })?
        };

        info!("[SUB] Subscriber ready: topic={}", self.entity.topic);

        Ok(RawSubscriber {
            entity: self.entity,
            queue,
            stats,
            matching,
            dispatcher: Mutex::new(Some(dispatcher)),
            handles: Mutex::new(Some(SubscriberHandles {
                _subscriber: subscriber,
                _matching_listener: matching_listener,
                _lv_token: lv_token,
            })),
        })
    }
}

struct SubscriberHandles {
    _subscriber: Subscriber<()>,
    _matching_listener: Subscriber<()>,
    _lv_token: LivelinessToken,
}

pub struct RawSubscriber {
    pub entity: EndpointEntity,
    queue: Arc<BoundedQueue<Sample>>,
    stats: Arc<SubscriberStats>,
    matching: Arc<MatchingState>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    handles: Mutex<Option<SubscriberHandles>>,
}

impl RawSubscriber {
    pub fn topic(&self) -> &str {
        &self.entity.topic
    }

    pub fn num_publishers(&self) -> usize {
        self.matching.count()
    }

    pub fn stats(&self) -> &SubscriberStats {
        &self.stats
    }

    pub fn is_valid(&self) -> bool {
        self.handles.lock().is_some()
    }

    /// Undeclare the subscriber and stop the dispatcher once it has drained.
    pub fn shutdown(&self) {
        if self.handles.lock().take().is_none() {
            return;
        }
        self.queue.close();
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            // A handler may shut its own subscriber down.
            if dispatcher.thread().id() != std::thread::current().id() && dispatcher.join().is_err() {
                warn!("[SUB] Dispatcher for {} panicked", self.entity.topic);
            }
        }
        debug!("[SUB] Shut down {}", self.entity.topic);
    }
}

impl Drop for RawSubscriber {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn att(sn: i64, gid: u8) -> ZBytes {
        ZBytes::from(Attachment::new(sn, [gid; 16]))
    }

    #[test]
    fn counts_sequence_gaps_per_source() {
        let stats = SubscriberStats::default();
        assert!(stats.track(Some(&att(0, 1))));
        assert!(stats.track(Some(&att(3, 1))));
        assert!(stats.track(Some(&att(10, 2))));
        assert!(stats.track(Some(&att(11, 2))));
        assert_eq!(stats.received(), 4);
        assert_eq!(stats.lost(), 2);
    }

    #[test]
    fn replayed_sample_is_rejected_without_phantom_loss() {
        let stats = SubscriberStats::default();
        assert!(stats.track(Some(&att(5, 1))));
        // Latched replay of an older or identical sample.
        assert!(!stats.track(Some(&att(4, 1))));
        assert!(!stats.track(Some(&att(5, 1))));
        assert!(stats.track(Some(&att(6, 1))));
        assert_eq!(stats.received(), 2);
        assert_eq!(stats.lost(), 0);
    }

    #[test]
    fn extreme_sequence_numbers_do_not_overflow() {
        let stats = SubscriberStats::default();
        assert!(stats.track(Some(&att(i64::MIN, 1))));
        assert!(stats.track(Some(&att(i64::MAX, 1))));
        assert_eq!(stats.lost(), (i64::MAX - 1) as u64);
        assert!(!stats.track(Some(&att(i64::MIN, 1))));
    }

    #[test]
    fn samples_without_attachment_are_accepted() {
        let stats = SubscriberStats::default();
        assert!(stats.track(None));
        assert!(stats.track(Some(&ZBytes::from(vec![1u8]))));
        assert_eq!(stats.received(), 2);
        assert_eq!(stats.lost(), 0);
    }
}

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use common::{DISCOVERY, RECV_TIMEOUT, cloud, collector, context, node};
use point_cloud_transport::{
    AdvertiseOptions, Builder, PointCloud2, PointCloudTransport, Subscriber, TransportError,
    TransportHints, msg::WithTypeInfo, qos::QosProfile,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_raw_roundtrip() {
    let ctx = context();
    let pct = PointCloudTransport::new(node(&ctx, "raw_roundtrip"));

    let publisher = pct.advertise("/pct_raw_points", 5, false).unwrap();
    let (cb, rx) = collector();
    let subscriber = pct
        .subscribe("/pct_raw_points", 5, cb, TransportHints::default())
        .unwrap();
    assert_eq!(subscriber.transport(), "raw");
    assert_eq!(subscriber.transport_topic(), "/pct_raw_points");

    tokio::time::sleep(DISCOVERY).await;
    assert!(publisher.num_subscribers() >= 1);
    assert_eq!(subscriber.num_publishers(), 1);

    let msg = cloud(64);
    publisher.publish(&msg).unwrap();

    let received = rx.recv_timeout(RECV_TIMEOUT).expect("no cloud received");
    assert_eq!(*received, msg);
}

#[cfg(feature = "lz4")]
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_lz4_selected_by_parameter() {
    let ctx = context();
    let pub_node = node(&ctx, "lz4_talker");
    let sub_node = ctx
        .create_node("lz4_listener")
        .with_parameter("~point_cloud_transport", "lz4")
        .build()
        .unwrap();

    let publisher = PointCloudTransport::new(pub_node)
        .advertise("/pct_lz4_points", 5, false)
        .unwrap();
    assert_eq!(publisher.transports(), vec!["raw", "lz4"]);
    assert_eq!(
        publisher.transport_topics(),
        vec!["/pct_lz4_points", "/pct_lz4_points/lz4"]
    );

    let (cb, rx) = collector();
    let subscriber = PointCloudTransport::new(sub_node)
        .subscribe("/pct_lz4_points", 5, cb, TransportHints::default())
        .unwrap();
    assert_eq!(subscriber.transport(), "lz4");
    assert_eq!(subscriber.transport_topic(), "/pct_lz4_points/lz4");

    tokio::time::sleep(DISCOVERY).await;
    let msg = cloud(2048);
    publisher.publish(&msg).unwrap();

    let received = rx.recv_timeout(RECV_TIMEOUT).expect("no cloud received");
    assert_eq!(*received, msg);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_relative_topic_resolves_in_namespace() {
    let ctx = context();
    let node = ctx
        .create_node("ns_talker")
        .with_namespace("/robot")
        .build()
        .unwrap();
    let pct = PointCloudTransport::new(node);

    let publisher = pct.advertise("pct_scan", 1, false).unwrap();
    assert_eq!(publisher.topic(), "/robot/pct_scan");

    let (cb, _rx) = collector();
    let subscriber = pct
        .subscribe("~/pct_private", 1, cb, TransportHints::new("raw"))
        .unwrap();
    assert_eq!(subscriber.topic(), "/robot/ns_talker/pct_private");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_connect_and_disconnect_callbacks() {
    let ctx = context();
    let pct = PointCloudTransport::new(node(&ctx, "status_talker"));

    let connected = Arc::new(AtomicUsize::new(0));
    let disconnected = Arc::new(AtomicUsize::new(0));
    let options = {
        let connected = connected.clone();
        let disconnected = disconnected.clone();
        AdvertiseOptions::default()
            .on_connect(move |link| {
                assert_eq!(link.transport, "raw");
                assert_eq!(link.subscriber_node, "status_listener");
                connected.fetch_add(1, Ordering::SeqCst);
            })
            .on_disconnect(move |_| {
                disconnected.fetch_add(1, Ordering::SeqCst);
            })
    };
    let publisher = pct.advertise_with("/pct_status_points", 1, options).unwrap();

    let listener = PointCloudTransport::new(node(&ctx, "status_listener"));
    let (cb, _rx) = collector();
    let subscriber = listener
        .subscribe("/pct_status_points", 1, cb, TransportHints::new("raw"))
        .unwrap();

    tokio::time::sleep(DISCOVERY).await;
    assert_eq!(connected.load(Ordering::SeqCst), 1);
    assert_eq!(publisher.num_subscribers(), 1);

    subscriber.shutdown();
    tokio::time::sleep(DISCOVERY).await;
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);
    assert_eq!(publisher.num_subscribers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_latched_cloud_reaches_late_subscriber() {
    let ctx = context();
    let pct = PointCloudTransport::new(node(&ctx, "latched_talker"));

    let publisher = pct.advertise("/pct_latched_points", 1, true).unwrap();
    let msg = cloud(16);
    publisher.publish(&msg).unwrap();

    tokio::time::sleep(DISCOVERY).await;
    let (cb, rx) = collector();
    let _subscriber = pct
        .subscribe("/pct_latched_points", 1, cb, TransportHints::new("raw"))
        .unwrap();

    let received = rx.recv_timeout(RECV_TIMEOUT).expect("latched cloud missing");
    assert_eq!(*received, msg);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_publish_after_shutdown_fails() {
    let ctx = context();
    let pct = PointCloudTransport::new(node(&ctx, "shutdown_talker"));

    let publisher = pct.advertise("/pct_shutdown_points", 1, false).unwrap();
    let clone = publisher.clone();
    publisher.shutdown();

    assert!(!clone.is_valid());
    assert_eq!(clone.num_subscribers(), 0);
    assert!(matches!(
        clone.publish(&cloud(4)),
        Err(TransportError::InvalidPublisher)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_dropping_last_clone_unadvertises() {
    let ctx = context();
    let pct = PointCloudTransport::new(node(&ctx, "drop_talker"));
    let listener = PointCloudTransport::new(node(&ctx, "drop_listener"));

    let (cb, _rx) = collector();
    let subscriber = listener
        .subscribe("/pct_drop_points", 1, cb, TransportHints::new("raw"))
        .unwrap();

    let publisher = pct.advertise("/pct_drop_points", 1, false).unwrap();
    let clone = publisher.clone();
    tokio::time::sleep(DISCOVERY).await;
    assert_eq!(subscriber.num_publishers(), 1);

    drop(publisher);
    tokio::time::sleep(DISCOVERY).await;
    assert_eq!(subscriber.num_publishers(), 1);

    drop(clone);
    tokio::time::sleep(DISCOVERY).await;
    assert_eq!(subscriber.num_publishers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_queue_drops_oldest_at_queue_size() {
    let ctx = context();
    let pct = PointCloudTransport::new(node(&ctx, "overflow_talker"));
    let publisher = pct.advertise("/pct_overflow_points", 1, false).unwrap();

    let (started_tx, started_rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::unbounded::<()>();
    let (seen_tx, seen_rx) = flume::unbounded();
    let first = AtomicBool::new(true);
    let _subscriber = pct
        .subscribe(
            "/pct_overflow_points",
            1,
            move |cloud: Arc<PointCloud2>| {
                seen_tx.send(cloud.point_count()).unwrap();
                if first.swap(false, Ordering::SeqCst) {
                    started_tx.send(()).unwrap();
                    let _ = gate_rx.recv();
                }
            },
            TransportHints::new("raw"),
        )
        .unwrap();
    tokio::time::sleep(DISCOVERY).await;

    publisher.publish(&cloud(1)).unwrap();
    started_rx.recv_timeout(RECV_TIMEOUT).expect("callback never started");
    for n in 2..=5 {
        publisher.publish(&cloud(n)).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    gate_tx.send(()).unwrap();

    assert_eq!(seen_rx.recv_timeout(RECV_TIMEOUT).unwrap(), 1);
    assert_eq!(seen_rx.recv_timeout(RECV_TIMEOUT).unwrap(), 5);
    assert!(seen_rx.recv_timeout(Duration::from_millis(300)).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_raw_subscriber_counts_overflow() {
    let ctx = context();
    let node = node(&ctx, "stats_node");
    let qos = QosProfile::from_queue_size(1, false);

    let publisher = node
        .create_pub("/pct_stats_bytes", PointCloud2::type_info())
        .with_qos(qos)
        .build()
        .unwrap();

    let (started_tx, started_rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::unbounded::<()>();
    let (seen_tx, seen_rx) = flume::unbounded();
    let first = AtomicBool::new(true);
    let subscriber = node
        .create_sub("/pct_stats_bytes", PointCloud2::type_info())
        .with_qos(qos)
        .build_with_handler(move |payload| {
            seen_tx.send(payload.to_vec()).unwrap();
            if first.swap(false, Ordering::SeqCst) {
                started_tx.send(()).unwrap();
                let _ = gate_rx.recv();
            }
        })
        .unwrap();
    tokio::time::sleep(DISCOVERY).await;

    publisher.publish(vec![0u8]).unwrap();
    started_rx.recv_timeout(RECV_TIMEOUT).expect("handler never started");
    for i in 1..5u8 {
        publisher.publish(vec![i]).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stats = subscriber.stats();
    assert_eq!(stats.received(), 5);
    assert_eq!(stats.overflowed(), 3);
    assert_eq!(stats.lost(), 0);

    gate_tx.send(()).unwrap();
    assert_eq!(seen_rx.recv_timeout(RECV_TIMEOUT).unwrap(), vec![0]);
    assert_eq!(seen_rx.recv_timeout(RECV_TIMEOUT).unwrap(), vec![4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_shutdown_while_callback_uses_subscriber() {
    let ctx = context();
    let pct = PointCloudTransport::new(node(&ctx, "reentrant_node"));
    let publisher = pct.advertise("/pct_reentrant_points", 1, false).unwrap();

    let slot: Arc<OnceLock<Subscriber>> = Arc::new(OnceLock::new());
    let (started_tx, started_rx) = flume::unbounded();
    let subscriber = {
        let slot = slot.clone();
        pct.subscribe(
            "/pct_reentrant_points",
            1,
            move |_cloud: Arc<PointCloud2>| {
                let _ = started_tx.send(());
                std::thread::sleep(Duration::from_millis(300));
                if let Some(sub) = slot.get() {
                    assert_eq!(sub.transport_topic(), "/pct_reentrant_points");
                    let _ = sub.num_publishers();
                }
            },
            TransportHints::new("raw"),
        )
        .unwrap()
    };
    let _ = slot.set(subscriber.clone());
    tokio::time::sleep(DISCOVERY).await;

    publisher.publish(&cloud(3)).unwrap();
    started_rx.recv_timeout(RECV_TIMEOUT).expect("callback never started");

    let (done_tx, done_rx) = flume::bounded(1);
    std::thread::spawn(move || {
        subscriber.shutdown();
        let _ = done_tx.send(());
    });
    assert!(
        done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "shutdown did not return while the callback was running"
    );
}

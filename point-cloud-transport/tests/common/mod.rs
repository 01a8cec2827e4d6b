#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use point_cloud_transport::{
    Builder, PointCloud2,
    context::{Context, ContextBuilder},
    node::Node,
};

pub const DISCOVERY: Duration = Duration::from_millis(300);
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub fn context() -> Context {
    ContextBuilder::default()
        .build()
        .expect("Failed to create context")
}

pub fn node(ctx: &Context, name: &str) -> Node {
    ctx.create_node(name)
        .build()
        .expect("Failed to create node")
}

pub fn cloud(n: usize) -> PointCloud2 {
    let points: Vec<[f32; 3]> = (0..n)
        .map(|i| [i as f32, (i % 7) as f32 * 0.5, -(i as f32)])
        .collect();
    PointCloud2::from_xyz("lidar", &points)
}

/// Callback forwarding every received cloud into a channel.
pub fn collector() -> (
    impl Fn(Arc<PointCloud2>) + Send + Sync + 'static,
    flume::Receiver<Arc<PointCloud2>>,
) {
    let (tx, rx) = flume::unbounded();
    (
        move |cloud| {
            let _ = tx.send(cloud);
        },
        rx,
    )
}

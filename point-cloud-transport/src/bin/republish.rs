use clap::Parser;
use point_cloud_transport::{
    Builder, PointCloudTransport, Result, TransportHints, context::ContextBuilder,
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "republish",
    about = "Subscribes through one transport and republishes on all of them"
)]
struct Args {
    /// Transport to subscribe with (e.g., raw, lz4)
    in_transport: String,

    /// Base topic to read from
    in_topic: String,

    /// Base topic to republish on
    out_topic: String,

    /// Stop after republishing this many clouds
    #[arg(short, long)]
    count: Option<usize>,

    /// Incoming queue size
    #[arg(short, long, default_value = "10")]
    queue_size: usize,

    /// Zenoh session mode (peer, client, router)
    #[arg(short, long, default_value = "peer")]
    mode: String,

    /// Zenoh router endpoint to connect to (e.g., tcp/localhost:7447)
    #[arg(short, long)]
    endpoint: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    zenoh::init_log_from_env_or("error");

    let mut builder = ContextBuilder::default().with_mode(args.mode);
    if let Some(e) = args.endpoint {
        builder = builder.with_connect_endpoints([e]);
    }
    let ctx = builder.build()?;
    let node = ctx.create_node("point_cloud_republisher").build()?;
    let pct = PointCloudTransport::new(node);

    let publisher = pct.advertise(&args.out_topic, 1, false)?;
    let (tx, rx) = flume::bounded(args.queue_size.max(1));
    let _subscriber = pct.subscribe(
        &args.in_topic,
        args.queue_size,
        move |cloud| {
            if tx.try_send(cloud).is_err() {
                warn!("[PCT] Republisher is falling behind, dropping a cloud");
            }
        },
        TransportHints::new(args.in_transport),
    )?;
    info!(
        "[PCT] Republishing {} on {:?}",
        publisher.topic(),
        publisher.transports()
    );

    let mut republished = 0;
    while let Ok(cloud) = rx.recv() {
        if let Err(e) = publisher.publish(&cloud) {
            warn!("[PCT] Failed to republish: {}", e);
            continue;
        }
        republished += 1;
        if args.count.is_some_and(|max| republished >= max) {
            break;
        }
    }

    publisher.shutdown();
    ctx.shutdown()
}

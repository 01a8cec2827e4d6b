use clap::Parser;
use point_cloud_transport::{
    Builder, PointCloudTransport, Result,
    context::ContextBuilder,
    plugin::{publisher_lookup_name, short_transport_name, subscriber_lookup_name},
};

#[derive(Debug, Parser)]
#[command(
    name = "list_transports",
    about = "Lists the declared point cloud transports and whether they load"
)]
struct Args {
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
    let node = ctx.create_node("list_transports").build()?;
    let pct = PointCloudTransport::new(node);

    let loadable = pct.loadable_transports();
    println!("Declared transports:");
    for transport in pct.declared_transports() {
        let status = if loadable.contains(&transport) {
            ""
        } else {
            " (*): Not available. Try rebuilding with the matching cargo feature."
        };
        println!("{transport}{status}");
    }

    println!("\nDetails:");
    for transport in pct.declared_transports() {
        let short = short_transport_name(&transport);
        println!("----------");
        println!("\"{transport}\"");
        let sub_name = subscriber_lookup_name(short);
        match pct.sub_loader().create_instance(&sub_name) {
            Ok(_) => {
                println!(" - Subscriber: {sub_name}");
                println!(" - Publisher: {}", publisher_lookup_name(short));
            }
            Err(e) => println!(" *** Plugins are not built. ***\n     {e}"),
        }
    }

    ctx.shutdown()
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use overlay::{
    network::with_peer_id, validator::sha256_key, ContentStore, Network, OverlayNode,
};
use tracing::{info, warn};

mod config;

#[derive(Parser, Debug)]
#[command(version, about = "Bitcoin Cash overlay network node")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network preset, overrides the config file
    #[arg(short, long)]
    network: Option<Network>,

    /// TCP listen port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Extra bootstrap peer multiaddr (repeatable)
    #[arg(short, long = "bootstrap")]
    bootstrap: Vec<String>,

    /// Skip DNS seed resolution
    #[arg(long, default_value_t = false)]
    no_dns: bool,

    /// Directory for the record store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stay online until interrupted
    Run,
    /// Store or fetch content-addressed values
    #[command(subcommand)]
    Dht(DhtCommand),
    /// Topic messaging
    #[command(subcommand)]
    Pubsub(PubsubCommand),
}

#[derive(Subcommand, Debug)]
enum DhtCommand {
    /// Store a value under its sha256 key
    Put { value: String },
    /// Fetch the value stored under a key
    Get { key: String },
}

#[derive(Subcommand, Debug)]
enum PubsubCommand {
    /// Print messages on a topic until interrupted
    Subscribe { topic: String },
    /// Publish one message on a topic
    Publish { topic: String, message: String },
}

fn apply_overrides(args: &Args, mut file: config::Config) -> config::Config {
    if let Some(network) = args.network {
        file.node.network = network;
    }
    if let Some(port) = args.port {
        file.node.port = port;
    }
    if let Some(dir) = &args.data_dir {
        file.node.data_dir = dir.clone();
    }
    if args.no_dns {
        file.node.disable_dns_seeds = true;
    }
    file.node.bootstrap_peers.extend(args.bootstrap.iter().cloned());
    file
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let args = Args::parse();
    let file = config::Config::from_config(args.config.as_ref()).context("loading config")?;
    let file = apply_overrides(&args, file);
    info!("{}", file);

    let node = OverlayNode::new(file.to_node_config()).await.context("starting node")?;

    match node.go_online().await {
        Ok(report) => info!(
            attempted = report.attempted,
            connected = report.connected.len(),
            "Joined the routing network"
        ),
        Err(e) => warn!("Continuing without bootstrap peers: {}", e),
    }

    let outcome = tokio::select! {
        result = execute(&node, args.command.unwrap_or(Command::Run)) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    node.shutdown().await.context("shutting down")?;
    outcome
}

async fn execute(node: &OverlayNode, command: Command) -> Result<()> {
    match command {
        Command::Run => {
            for addr in node.listen_addrs().await {
                info!("Listening on {}", with_peer_id(&addr, node.peer_id()));
            }
            std::future::pending::<()>().await;
            Ok(())
        }
        Command::Dht(DhtCommand::Put { value }) => {
            let key = sha256_key(value.as_bytes());
            node.routing().put_value(&key, value.into_bytes()).await?;
            println!("{key}");
            Ok(())
        }
        Command::Dht(DhtCommand::Get { key }) => {
            let value = node.routing().get_value(&key).await?;
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        Command::Pubsub(PubsubCommand::Subscribe { topic }) => {
            let mut subscription = node.pubsub().subscribe(&topic).await?;
            info!(%topic, "Subscribed");
            while let Some(message) = subscription.next().await {
                let from = message.source.map(|p| p.to_string()).unwrap_or_default();
                println!("[{from}] {}", String::from_utf8_lossy(&message.data));
            }
            Ok(())
        }
        Command::Pubsub(PubsubCommand::Publish { topic, message }) => {
            let (_messages, discovery) = node.pubsub().subscribe(&topic).await?.into_parts();
            let report = discovery.finished().await;
            info!(connected = report.connected.len(), "Topic peers found");
            node.pubsub().publish(&topic, message.into_bytes()).await?;
            Ok(())
        }
    }
}

//! The sable validator binary.

use clap::Parser;
use sable_node::{telemetry, Node, NodeConfig};
use sable_types::BlsKeyPair;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sable", about = "sable network validator node")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default log filter (RUST_LOG overrides).
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(&args.log);

    let config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };

    let keys = BlsKeyPair::generate();
    info!(public_key = ?keys.public_key(), "starting node");

    let node = Node::start(config, keys)?;
    node.initialize();

    tokio::signal::ctrl_c().await?;
    node.shutdown();
    Ok(())
}

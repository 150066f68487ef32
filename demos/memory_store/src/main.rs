//! Runnable demonstration of the oxidedb protocol core wired to the
//! in-memory `MemoryStore`. Start it and point `mongosh` (or the driver of
//! your choice) at `--listen-addr` to exercise hello/buildInfo/SASL and
//! insert/find/update/delete end to end without a real database behind it.

mod store;

use std::sync::Arc;

use clap::Parser;
use oxidedb::config::Config;
use oxidedb::executor::Dispatcher;
use oxidedb::server::Server;

use store::MemoryStore;

#[derive(Debug, Parser)]
#[command(name = "memory_store", about = "oxidedb core backed by an in-memory store")]
struct Cli {
    #[arg(short = 'c', long = "config", env = "OXIDEDB_CONFIG")]
    config: Option<String>,

    #[arg(long = "listen-addr", env = "OXIDEDB_LISTEN_ADDR")]
    listen_addr: Option<String>,

    #[arg(long = "log-level", env = "OXIDEDB_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter_spec = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter_spec))
        .compact()
        .init();

    let cfg = Config::load_from_file(cli.config.as_deref())
        .unwrap_or_default()
        .with_overrides(cli.listen_addr.clone(), cli.log_level.clone());
    cfg.validate()?;
    tracing::info!(listen_addr = %cfg.listen_addr, "starting memory_store demo");

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(cfg), Some(Arc::new(MemoryStore::new()))));
    let server = Server::new(dispatcher.config.clone(), dispatcher)?;
    server.run().await?;
    Ok(())
}

use std::sync::Arc;

use clap::Parser;
use oxidedb::config::Config;
use oxidedb::executor::Dispatcher;
use oxidedb::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env first so clap's env fallbacks see variables.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Attempt to load config before initializing logs to pick up log_level from file.
    let cfg_file_res = Config::load_from_file(cli.config.as_deref());
    let cfg_file = match &cfg_file_res {
        Ok(c) => c.clone(),
        Err(_) => Config::default(),
    };

    // Determine log filter precedence: CLI (--log-level / OXIDEDB_LOG_LEVEL)
    // > RUST_LOG (env) > config.toml log_level > default("info").
    let filter_spec = if let Some(ref lvl) = cli.log_level {
        lvl.clone()
    } else if let Ok(env_spec) = std::env::var("RUST_LOG") {
        env_spec
    } else if let Some(ref lvl) = cfg_file.log_level {
        lvl.clone()
    } else {
        "info".to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter_spec))
        .compact()
        .init();

    if let Err(e) = cfg_file_res.as_ref() {
        tracing::warn!(error = %format!("{e:?}"), "invalid config; using defaults");
    }

    let cfg = cfg_file.with_overrides(cli.listen_addr.clone(), cli.log_level.clone());
    cfg.validate()?;
    tracing::info!(listen_addr = %cfg.listen_addr, "starting oxidedb");

    // No storage executor is wired here: the binary exposes the protocol
    // core with every database/auth command working out of the box
    // (hello/buildInfo/SASL), but insert/update/find/delete require an
    // embedder to supply a `UserCommandExecutor` — see `demos/memory_store`
    // for a runnable example.
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(cfg), None));
    let server = Server::new(dispatcher.config.clone(), dispatcher)?;

    if let Err(e) = server.run().await {
        tracing::error!(error = %format!("{e:?}"), "server terminated with error");
    }

    Ok(())
}

#[derive(Debug, Parser, Clone)]
#[command(name = "oxidedb", version, about = "MongoDB wire-protocol server core")]
struct Cli {
    /// Path to config TOML file
    #[arg(short = 'c', long = "config", env = "OXIDEDB_CONFIG")]
    config: Option<String>,

    /// Listen address for the server (e.g., 127.0.0.1:27017)
    #[arg(long = "listen-addr", env = "OXIDEDB_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Log level or filter spec (e.g., info or info,oxidedb=debug)
    #[arg(long = "log-level", env = "OXIDEDB_LOG_LEVEL")]
    log_level: Option<String>,
}

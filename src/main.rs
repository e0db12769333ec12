//! hello-listener: a concurrent TCP greeting server
//!
//! Every chunk of data a client sends is answered on the same connection
//! with `Hello ` followed by the chunk, unchanged.
//!
//! Features:
//! - One task per connection; a slow or idle client never delays another
//! - Per-connection faults are logged and confined to that connection
//! - Configuration via CLI arguments, the `PORT` variable or a TOML file

mod config;
mod connection;
mod error;
mod protocols;
mod server;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        workers = ?config.workers,
        buffer_size = config.buffer_size,
        "Starting hello-listener"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers.filter(|&n| n > 0) {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(run(config))
}

/// Bind, then serve until the process is killed.
async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(&config).await?;
    server.run().await;
    Ok(())
}

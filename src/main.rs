//! Gatehouse server binary.
//!
//! ```text
//!     Client Request
//!     ──▶ http server (axum + tower-http)
//!     ──▶ dispatcher: match → middleware → auth → authorize → rate check
//!                     → bind → invoke → respond
//!     ◀── JSON envelope / handler reply
//! ```

use clap::Parser;
use std::path::PathBuf;

use gatehouse::config::{load_config, loader::default_config};
use gatehouse::observability::init_logging;

#[derive(Debug, Parser)]
#[command(name = "gatehouse", version, about = "HTTP dispatch and guard core")]
struct Args {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };
    init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?args.config, "gatehouse starting");
    gatehouse::lifecycle::run(config).await?;
    Ok(())
}

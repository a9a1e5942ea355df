//! agentpromote admin interface
//!
//! Binds the operator socket and wires it to a [`Promoter`] built from the
//! JSON configuration file. Usage:
//!
//! ```text
//! agentpromote-admin [config-path]
//! ```
//!
//! The listen address defaults to `127.0.0.1:3000` and can be overridden
//! with `ADMIN_ADDR`. Log verbosity follows `RUST_LOG`.

mod protocol;
mod server;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use agentpromote_core::config::PromoteConfig;
use agentpromote_core::promote::Promoter;

const DEFAULT_CONFIG: &str = "agentpromote.json";
const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = PromoteConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    let promoter =
        Arc::new(Promoter::from_config(&config).context("failed to initialise promoter")?);
    tracing::info!(
        version = agentpromote_core::VERSION,
        config = %config_path,
        "agentpromote starting"
    );

    let addr = std::env::var("ADMIN_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    server::run(&addr, promoter).await
}

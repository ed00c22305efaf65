//! Serve command - runs the HTTP server.

use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use clap::Args;

use quarry_server::{Server, ServerConfig};

use super::Context;
use crate::runtime::Runtime;

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Allow cross-origin requests (overrides config)
    #[arg(long)]
    pub cors: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    let server_cfg = config.server.clone().unwrap_or_default();
    let port = args.port.unwrap_or(server_cfg.port);
    let bind = args.bind.unwrap_or(server_cfg.bind);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", bind, port))?;

    let base_dir = std::env::current_dir()?;
    let runtime = Runtime::build(config, &base_dir).await?;

    let _cleanup = quarry_session::spawn_cleanup_task(runtime.store.clone(), runtime.cleanup_interval);

    let server_config = ServerConfig::new()
        .with_bind_address(addr)
        .with_cors(args.cors || server_cfg.cors)
        .with_request_logging(server_cfg.request_logging)
        .with_max_steps_limit(runtime.max_steps_limit);

    if ctx.verbose {
        eprintln!("Model: {}", config.model());
        eprintln!("Session store: {}", runtime.store.name());
        eprintln!("Bind address: {}", addr);
    }

    println!("Quarry listening on http://{}", addr);
    Server::new(runtime.orchestrator, server_config).run().await?;

    Ok(())
}

//! The `serve` command (alias `start`).
//!
//! Stands up the dev server: shared state over the loaded configuration, a
//! recursive watcher over the project root and watch folders, the change
//! pump feeding the delta pipeline, and the HTTP listener with graceful
//! shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::cli::ServeArgs;
use crate::commands::{load_config, maybe_reset_cache};
use crate::error::{CliError, Result};
use crate::server::state::ServerState;
use crate::server::{pump_file_changes, serve};
use crate::watcher::FileWatcher;

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    config.validate()?;
    maybe_reset_cache(&config, args.common.reset_cache)?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| CliError::Server(format!("invalid bind address: {e}")))?;

    let mut watch_roots = vec![config.root.clone()];
    for folder in &config.watch_folders {
        watch_roots.push(config.absolute(folder));
    }
    let ignored = vec![config.cache_dir(), config.root.join("dist")];

    let state = Arc::new(ServerState::new(config));
    let (watcher, change_rx) = FileWatcher::new(watch_roots, ignored, 50)?;
    tracing::debug!(roots = ?watcher.roots(), "watching for file changes");

    let pump_state = Arc::clone(&state);
    let pump = tokio::spawn(pump_file_changes(pump_state, change_rx));

    let result = serve(state, addr).await;

    // Listener closed: stop watching before reporting the outcome.
    pump.abort();
    drop(watcher);
    result
}

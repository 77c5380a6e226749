//! Logging setup for the CLI.
//!
//! tracing-subscriber with an `EnvFilter` and a compact formatter. The level
//! comes from `--verbose`/`--quiet`, falling back to `RUST_LOG`, falling
//! back to info for the bungae crates.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new("bungae=debug,bungae_config=debug,bungae_resolver=debug,bungae_transform=debug,bungae_graph=debug,bungae_bundler=debug,bungae_cli=debug")
    } else if quiet {
        EnvFilter::new("bungae=error,bungae_cli=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("bungae=info,bungae_graph=info,bungae_bundler=info,bungae_cli=info")
        })
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_construct() {
        // tracing can only be installed once per process; just make sure the
        // filter expressions themselves are well-formed.
        let _ = EnvFilter::new("bungae=debug,bungae_cli=debug");
        let _ = EnvFilter::new("bungae=error");
    }
}

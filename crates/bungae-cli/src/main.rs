//! Bungae CLI entry point.
//!
//! Parses arguments, initializes logging, and dispatches to the `build` or
//! `serve` command. Exit codes: 0 on success, 1 on failure; clap reports
//! usage errors with exit code 2.

use clap::Parser;

use bungae_cli::{cli, commands, logger};

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();
    logger::init_logger(args.verbose, args.quiet, args.no_color);

    let result = match args.command {
        cli::Command::Build(build_args) => commands::build::execute(build_args).await,
        cli::Command::Serve(serve_args) => commands::serve::execute(serve_args).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

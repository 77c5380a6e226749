//! Command-line interface definition.
//!
//! clap v4 derive structs for the `build` and `serve` commands. `--mode`
//! sets both flags at once (`release` is `production` plus minification);
//! the individual `--dev`/`--minify` switches override it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use bungae_config::Platform;

/// Bungae - an incremental JavaScript bundler for mobile runtimes.
#[derive(Parser, Debug)]
#[command(
    name = "bungae",
    version,
    about = "An incremental JavaScript/TypeScript bundler for mobile app runtimes"
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Produce a bundle and its source map on disk
    Build(BuildArgs),
    /// Run the development server
    #[command(alias = "start")]
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Development,
    Production,
    /// Production plus minification
    Release,
}

impl Mode {
    pub fn dev(&self) -> bool {
        matches!(self, Mode::Development)
    }

    pub fn minify(&self) -> bool {
        matches!(self, Mode::Release)
    }
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Target platform
    #[arg(long, value_parser = parse_platform, default_value = "ios")]
    pub platform: Platform,

    /// Build in development mode (overrides --mode)
    #[arg(long)]
    pub dev: bool,

    /// Minify the output (overrides --mode)
    #[arg(long)]
    pub minify: bool,

    /// Build mode
    #[arg(long, value_enum, default_value_t = Mode::Development)]
    pub mode: Mode,

    /// Entry point, relative to the project root
    #[arg(long)]
    pub entry: Option<PathBuf>,

    /// Explicit config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Project root directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Delete the transform cache before building
    #[arg(long)]
    pub reset_cache: bool,
}

impl CommonArgs {
    /// Effective dev flag: `--dev` wins, then the mode.
    pub fn effective_dev(&self) -> bool {
        self.dev || self.mode.dev()
    }

    /// Effective minify flag: `--minify` wins, then the mode.
    pub fn effective_minify(&self) -> bool {
        self.minify || self.mode.minify()
    }
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output directory
    #[arg(long = "outDir", alias = "out-dir", default_value = "dist")]
    pub out_dir: PathBuf,

    /// Skip writing the source map and its URL comment
    #[arg(long)]
    pub no_sourcemap: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Port to listen on (default from config, 8081)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    value.parse::<Platform>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_parse() {
        let cli = Cli::parse_from([
            "bungae", "build", "--platform", "android", "--mode", "release", "--outDir", "out",
        ]);
        let Command::Build(args) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(args.common.platform, Platform::Android);
        assert!(!args.common.effective_dev());
        assert!(args.common.effective_minify());
        assert_eq!(args.out_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_start_alias() {
        let cli = Cli::parse_from(["bungae", "start", "--port", "9090"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.port, Some(9090));
    }

    #[test]
    fn test_dev_overrides_mode() {
        let cli = Cli::parse_from(["bungae", "build", "--mode", "production", "--dev"]);
        let Command::Build(args) = cli.command else {
            panic!("expected build command");
        };
        assert!(args.common.effective_dev());
        assert!(!args.common.effective_minify());
    }

    #[test]
    fn test_invalid_platform_rejected() {
        let result = Cli::try_parse_from(["bungae", "build", "--platform", "macos"]);
        assert!(result.is_err());
    }
}

//! The `build` command.
//!
//! One-shot build: construct the graph, serialize, and write the bundle and
//! its map under the output directory with the platform's file name.

use std::time::Instant;

use bungae_bundler::{output_file_name, serialize, SerializeOptions};
use bungae_config::BundleParams;
use bungae_graph::{BuildOptions, CountingObserver, GraphBuilder, IdAllocator};
use bungae_resolver::Resolver;
use bungae_transform::{TransformCache, TransformerAdapter};

use crate::cli::BuildArgs;
use crate::commands::{load_config, maybe_reset_cache};
use crate::error::Result;

pub async fn execute(args: BuildArgs) -> Result<()> {
    let started = Instant::now();
    let config = load_config(&args.common)?;
    config.validate()?;
    maybe_reset_cache(&config, args.common.reset_cache)?;

    let params = BundleParams::new(args.common.platform)
        .dev(args.common.effective_dev())
        .minify(args.common.effective_minify());
    let entry = config.entry_path();
    tracing::info!(
        entry = %entry.display(),
        platform = %params.platform,
        dev = params.dev,
        "building bundle"
    );

    let resolver = Resolver::new(&config);
    let transformer = TransformerAdapter::new();
    let cache = TransformCache::new(
        config.cache_dir(),
        std::time::Duration::from_secs(config.cache_max_age_secs),
    );
    let builder = GraphBuilder::new(
        &config,
        &resolver,
        &transformer,
        Some(&cache),
        BuildOptions {
            platform: params.platform,
            dev: params.dev,
        },
    );

    let mut observer = CountingObserver::default();
    let mut graph = builder.build(&entry, &mut observer)?;
    tracing::info!(modules = graph.modules.len(), "graph complete");

    let file_name = output_file_name(&entry, params.platform, params.dev);
    let options = SerializeOptions {
        source_map_url: (!args.no_sourcemap).then(|| format!("{file_name}.map")),
        source_url: None,
        inline_source_map: false,
    };
    let mut ids = IdAllocator::new();
    let output = serialize(&mut graph, &mut ids, &config, &params, &options)?;

    let out_dir = if args.out_dir.is_absolute() {
        args.out_dir.clone()
    } else {
        config.root.join(&args.out_dir)
    };
    std::fs::create_dir_all(&out_dir)?;

    let bundle_path = out_dir.join(&file_name);
    std::fs::write(&bundle_path, &output.code)?;
    tracing::info!(bundle = %bundle_path.display(), "bundle written");

    if !args.no_sourcemap {
        let map_path = out_dir.join(format!("{file_name}.map"));
        std::fs::write(&map_path, output.map_json()?)?;
        tracing::info!(map = %map_path.display(), "source map written");
    }

    tracing::info!(
        modules = graph.modules.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "build finished"
    );
    Ok(())
}

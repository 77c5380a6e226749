//! Bundle serialization.
//!
//! Walks the canonical module order, splices each module's id and dependency
//! vector into its pre-generated define call, and assembles the prepend
//! block, the module block, and the post block into the final byte stream
//! while feeding the source-map compositor in the same pass. The spliced
//! tail lands immediately before the closing parenthesis of the define call,
//! so earlier byte positions (and with them the module's raw mappings) are
//! untouched.

use std::path::Path;

use bungae_config::{BundleParams, BundlerConfig, Platform, SourcePathMode};
use bungae_graph::{post_order, Dependency, Graph, IdAllocator, Module};

use crate::error::{Result, SerializeError};
use crate::prelude::fill_prepend;
use crate::sourcemap::{compose, ModuleMapInput, SourceMap};

/// Per-request serialization options.
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    pub source_map_url: Option<String>,
    pub source_url: Option<String>,
    pub inline_source_map: bool,
}

/// A serialized bundle and its composed map.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub code: String,
    pub map: SourceMap,
}

impl BundleOutput {
    pub fn map_json(&self) -> Result<String> {
        Ok(self.map.to_json()?)
    }
}

/// Serialize a graph for one session configuration.
///
/// Ids are assigned by walking the DFS post-order through the session's
/// allocator; reusing the allocator across calls keeps them stable.
pub fn serialize(
    graph: &mut Graph,
    ids: &mut IdAllocator,
    config: &BundlerConfig,
    params: &BundleParams,
    options: &SerializeOptions,
) -> Result<BundleOutput> {
    let order = post_order(graph);
    ids.assign_all(&order);

    let mut parts: Vec<String> = Vec::with_capacity(order.len() + 4);
    let mut skip_lines = 0u32;

    if !params.modules_only {
        fill_prepend(graph, config, params.dev)?;
        for script in &graph.prepend {
            skip_lines += script.line_count;
            parts.push(normalize_part(&script.code).to_string());
        }
    }

    let mut map_inputs = Vec::with_capacity(order.len());
    for path in &order {
        let Some(module) = graph.modules.get(path) else {
            continue;
        };
        let id = ids
            .id_for(path)
            .expect("ordered module was assigned an id");
        let tail = define_tail(module, id, ids, config, params.dev);
        parts.push(splice_tail(&module.code, &tail, path)?);
        map_inputs.push(module_map_input(module, config, params));
    }

    if !params.modules_only {
        let mut post = Vec::new();
        for path in &graph.run_before_main {
            if let Some(id) = ids.id_for(path) {
                post.push(format!("__r({id});"));
            }
        }
        if params.run_module {
            if let Some(entry_id) = ids.id_for(&graph.entry) {
                post.push(format!("__r({entry_id});"));
            }
        }
        if !post.is_empty() {
            parts.push(post.join("\n"));
        }
    }

    let map = compose(skip_lines, &map_inputs, params.exclude_source);
    tracing::debug!(
        modules = order.len(),
        prepend = graph.prepend.len(),
        platform = %params.platform,
        "bundle serialized"
    );

    if options.inline_source_map {
        let map_json = map.to_json()?;
        parts.push(format!(
            "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}",
            base64::encode(map_json)
        ));
    } else if let Some(url) = &options.source_map_url {
        parts.push(format!("//# sourceMappingURL={url}"));
    }
    if let Some(url) = &options.source_url {
        parts.push(format!("//# sourceURL={url}"));
    }

    Ok(BundleOutput {
        code: parts.join("\n"),
        map,
    })
}

/// The `, <id>, [<depIds>]` tail (dev builds add the verbose name).
fn define_tail(
    module: &Module,
    id: u32,
    ids: &IdAllocator,
    config: &BundlerConfig,
    dev: bool,
) -> String {
    let dep_ids: Vec<String> = module
        .dependencies
        .iter()
        .map(|dep| match dep {
            Dependency::Resolved(path) => ids
                .id_for(path)
                .map(|id| id.to_string())
                .unwrap_or_else(|| "null".to_string()),
            Dependency::Unresolved => "null".to_string(),
        })
        .collect();
    let mut tail = format!(",{id},[{}]", dep_ids.join(","));
    if dev {
        tail.push_str(&format!(",{:?}", verbose_name(&module.path, config)));
    }
    tail
}

/// Append a tail before the closing parenthesis of a wrapped define call.
/// The wrapper guarantees the `})` suffix; anything else is a hard error
/// rather than a regex hunt through user code.
pub fn splice_tail(code: &str, tail: &str, path: &Path) -> Result<String> {
    let body = code
        .strip_suffix(')')
        .filter(|body| body.ends_with('}'))
        .ok_or_else(|| SerializeError::MalformedWrapper {
            path: path.to_path_buf(),
        })?;
    Ok(format!("{body}{tail})"))
}

/// Project-relative display name used for dev bundles and HMR payloads.
pub fn verbose_name(path: &Path, config: &BundlerConfig) -> String {
    path.strip_prefix(&config.root)
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| path.to_string_lossy().into_owned())
}

/// The `sources` entry for a module under the requested path mode.
pub fn map_source_name(path: &Path, config: &BundlerConfig, mode: SourcePathMode) -> String {
    match mode {
        SourcePathMode::Absolute => path.to_string_lossy().into_owned(),
        SourcePathMode::UrlServer => {
            if let Ok(rel) = path.strip_prefix(&config.root) {
                return format!("/[project]/{}", rel.to_string_lossy().replace('\\', "/"));
            }
            for (index, folder) in config.watch_folders.iter().enumerate() {
                let folder = config.absolute(folder);
                if let Ok(rel) = path.strip_prefix(&folder) {
                    return format!(
                        "/[watch-folders]/{index}/{}",
                        rel.to_string_lossy().replace('\\', "/")
                    );
                }
            }
            path.to_string_lossy().into_owned()
        }
    }
}

/// Default ignore-list policy: anything under a package root.
pub fn is_ignored_source(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str() == "node_modules")
}

fn module_map_input(module: &Module, config: &BundlerConfig, params: &BundleParams) -> ModuleMapInput {
    ModuleMapInput {
        source_name: map_source_name(&module.path, config, params.source_paths),
        raw_mappings: module.raw_mappings.clone(),
        source_content: if params.exclude_source || module.original_source.is_empty() {
            None
        } else {
            Some(module.original_source.clone())
        },
        line_count: module.line_count,
        is_ignored: is_ignored_source(&module.path),
    }
}

fn normalize_part(code: &str) -> &str {
    code.strip_suffix('\n').unwrap_or(code)
}

/// `sourceMappingURL` comment carrying the whole map as a data URL.
pub fn inline_map_comment(map_json: &str) -> String {
    format!(
        "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}",
        base64::encode(map_json)
    )
}

/// Platform-specific output file name for one-shot builds.
pub fn output_file_name(entry: &Path, platform: Platform, dev: bool) -> String {
    let base = entry
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("index");
    match platform {
        Platform::Ios => {
            if dev {
                format!("{base}.jsbundle")
            } else {
                "main.jsbundle".to_string()
            }
        }
        Platform::Android => format!("{base}.android.bundle"),
        Platform::Web => format!("{base}.bundle.js"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bungae_config::Platform;
    use bungae_graph::{BuildOptions, CountingObserver, GraphBuilder};
    use bungae_resolver::Resolver;
    use bungae_transform::TransformerAdapter;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn build_graph(dir: &TempDir, entry: &str, params: &BundleParams) -> (BundlerConfig, Graph) {
        let config = BundlerConfig::new(dir.path().to_path_buf());
        let resolver = Resolver::new(&config);
        let transformer = TransformerAdapter::new();
        let builder = GraphBuilder::new(
            &config,
            &resolver,
            &transformer,
            None,
            BuildOptions {
                platform: params.platform,
                dev: params.dev,
            },
        );
        let graph = builder
            .build(&dir.path().join(entry), &mut CountingObserver::default())
            .unwrap();
        (config, graph)
    }

    fn write(dir: &TempDir, file: &str, content: &str) {
        let path = dir.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }

    #[test]
    fn test_hello_world_bundle() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "console.log('hello');");
        let params = BundleParams::new(Platform::Ios);
        let (config, mut graph) = build_graph(&dir, "index.js", &params);

        let mut ids = IdAllocator::new();
        let output = serialize(
            &mut graph,
            &mut ids,
            &config,
            &params,
            &SerializeOptions::default(),
        )
        .unwrap();

        assert!(output.code.contains("__BUNGAE__"));
        assert!(output.code.contains("__d("));
        assert!(output.code.contains("__r(0);"));
        assert!(output.code.contains("console.log('hello');"));
    }

    #[test]
    fn test_post_order_ids() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "TestBundle.js",
            "const Bar=require('./Bar');const Foo=require('./Foo');module.exports={Foo,Bar};",
        );
        write(&dir, "Foo.js", "module.exports={foo:'foo'};");
        write(&dir, "Bar.js", "module.exports={bar:'bar'};");
        let params = BundleParams::new(Platform::Ios);
        let (config, mut graph) = build_graph(&dir, "TestBundle.js", &params);

        let mut ids = IdAllocator::new();
        let output = serialize(
            &mut graph,
            &mut ids,
            &config,
            &params,
            &SerializeOptions::default(),
        )
        .unwrap();

        // Post-order: Bar, Foo, then the entry at id 2.
        assert_eq!(ids.id_for(&dir.path().join("Bar.js")), Some(0));
        assert_eq!(ids.id_for(&dir.path().join("Foo.js")), Some(1));
        assert_eq!(ids.id_for(&dir.path().join("TestBundle.js")), Some(2));
        assert!(output.code.contains(",2,[0,1]"));
        assert!(output.code.contains("__r(2);"));
    }

    #[test]
    fn test_determinism() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "const Foo=require('./Foo');");
        write(&dir, "Foo.js", "module.exports=1;");
        let params = BundleParams::new(Platform::Ios);

        let (config, mut graph_a) = build_graph(&dir, "index.js", &params);
        let mut ids_a = IdAllocator::new();
        let a = serialize(&mut graph_a, &mut ids_a, &config, &params, &SerializeOptions::default())
            .unwrap();

        let (config, mut graph_b) = build_graph(&dir, "index.js", &params);
        let mut ids_b = IdAllocator::new();
        let b = serialize(&mut graph_b, &mut ids_b, &config, &params, &SerializeOptions::default())
            .unwrap();

        assert_eq!(a.code, b.code);
        assert_eq!(a.map_json().unwrap(), b.map_json().unwrap());
    }

    #[test]
    fn test_modules_only_suppresses_pre_and_post() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "console.log(1);");
        let mut params = BundleParams::new(Platform::Ios);
        params.modules_only = true;
        let (config, mut graph) = build_graph(&dir, "index.js", &params);

        let mut ids = IdAllocator::new();
        let output = serialize(
            &mut graph,
            &mut ids,
            &config,
            &params,
            &SerializeOptions::default(),
        )
        .unwrap();

        assert!(!output.code.contains("__BUNGAE__"));
        assert!(!output.code.contains("__r("));
        assert!(output.code.starts_with("__d("));
    }

    #[test]
    fn test_run_module_false() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "console.log(1);");
        let mut params = BundleParams::new(Platform::Ios);
        params.run_module = false;
        let (config, mut graph) = build_graph(&dir, "index.js", &params);

        let mut ids = IdAllocator::new();
        let output = serialize(
            &mut graph,
            &mut ids,
            &config,
            &params,
            &SerializeOptions::default(),
        )
        .unwrap();
        assert!(!output.code.contains("__r(0);"));
    }

    #[test]
    fn test_unresolved_slot_serializes_null() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "require('./missing');");
        let params = BundleParams::new(Platform::Ios);
        let (config, mut graph) = build_graph(&dir, "index.js", &params);

        let mut ids = IdAllocator::new();
        let output = serialize(
            &mut graph,
            &mut ids,
            &config,
            &params,
            &SerializeOptions::default(),
        )
        .unwrap();
        assert!(output.code.contains(",0,[null]"));
    }

    #[test]
    fn test_dev_tail_carries_verbose_name() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/App.js", "console.log(1);");
        let params = BundleParams::new(Platform::Ios);
        let (config, mut graph) = build_graph(&dir, "src/App.js", &params);

        let mut ids = IdAllocator::new();
        let output = serialize(
            &mut graph,
            &mut ids,
            &config,
            &params,
            &SerializeOptions::default(),
        )
        .unwrap();
        assert!(output.code.contains(",0,[],\"src/App.js\")"));
    }

    #[test]
    fn test_map_aligns_with_bundle_lines() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "const a = 1;\nconsole.log(a);");
        let params = BundleParams::new(Platform::Ios);
        let (config, mut graph) = build_graph(&dir, "index.js", &params);

        let mut ids = IdAllocator::new();
        let output = serialize(
            &mut graph,
            &mut ids,
            &config,
            &params,
            &SerializeOptions::default(),
        )
        .unwrap();

        let map_json = output.map_json().unwrap();
        let consumer = crate::sourcemap::SourceMapConsumer::parse(&map_json).unwrap();
        let bundle_lines: Vec<&str> = output.code.split('\n').collect();

        // Find the line holding the module body and check it maps to source line 1.
        let body_line = bundle_lines
            .iter()
            .position(|l| l.contains("const a = 1;"))
            .unwrap() as u32
            + 1;
        let hit = consumer.lookup(body_line, 0).unwrap();
        assert_eq!(hit.line, 1);
        assert!(hit.source.ends_with("index.js"));
    }

    #[test]
    fn test_source_map_url_comments() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "console.log(1);");
        let params = BundleParams::new(Platform::Ios);
        let (config, mut graph) = build_graph(&dir, "index.js", &params);

        let mut ids = IdAllocator::new();
        let options = SerializeOptions {
            source_map_url: Some("/index.map".to_string()),
            source_url: Some("http://localhost:8081/index.bundle".to_string()),
            inline_source_map: false,
        };
        let output = serialize(&mut graph, &mut ids, &config, &params, &options).unwrap();

        assert!(output.code.contains("//# sourceMappingURL=/index.map"));
        assert!(output
            .code
            .ends_with("//# sourceURL=http://localhost:8081/index.bundle"));
    }

    #[test]
    fn test_splice_tail_rejects_malformed() {
        let err = splice_tail("not a wrapper", ",0,[]", Path::new("/x.js")).unwrap_err();
        assert!(matches!(err, SerializeError::MalformedWrapper { .. }));
    }

    #[test]
    fn test_url_server_source_names() {
        let config = BundlerConfig::new(PathBuf::from("/app"));
        assert_eq!(
            map_source_name(Path::new("/app/src/a.js"), &config, SourcePathMode::UrlServer),
            "/[project]/src/a.js"
        );
        assert_eq!(
            map_source_name(Path::new("/app/src/a.js"), &config, SourcePathMode::Absolute),
            "/app/src/a.js"
        );

        let mut config = BundlerConfig::new(PathBuf::from("/app"));
        config.watch_folders.push(PathBuf::from("/shared"));
        assert_eq!(
            map_source_name(Path::new("/shared/lib.js"), &config, SourcePathMode::UrlServer),
            "/[watch-folders]/0/lib.js"
        );
    }

    #[test]
    fn test_output_file_names() {
        let entry = Path::new("/app/index.js");
        assert_eq!(output_file_name(entry, Platform::Ios, true), "index.jsbundle");
        assert_eq!(output_file_name(entry, Platform::Ios, false), "main.jsbundle");
        assert_eq!(
            output_file_name(entry, Platform::Android, true),
            "index.android.bundle"
        );
        assert_eq!(output_file_name(entry, Platform::Web, true), "index.bundle.js");
    }

    #[test]
    fn test_node_modules_ignored_in_map() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "const l=require('leftpad');");
        write(&dir, "node_modules/leftpad/index.js", "module.exports=1;");
        let params = BundleParams::new(Platform::Ios);
        let (config, mut graph) = build_graph(&dir, "index.js", &params);

        let mut ids = IdAllocator::new();
        let output = serialize(
            &mut graph,
            &mut ids,
            &config,
            &params,
            &SerializeOptions::default(),
        )
        .unwrap();

        // Exactly one source (the leftpad module) is ignore-listed.
        assert_eq!(output.map.x_google_ignore_list.len(), 1);
        let ignored_index = output.map.x_google_ignore_list[0] as usize;
        assert!(output.map.sources[ignored_index].contains("node_modules"));
    }
}

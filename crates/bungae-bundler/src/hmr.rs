//! HMR protocol messages and update construction.
//!
//! Frames follow the Metro wire protocol: tagged JSON objects in kebab-case,
//! `update` bodies carrying `[id, code]` module pairs, and `deleted` lists of
//! integer ids taken from the session's id table so clients can drop modules
//! they registered in earlier revisions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use bungae_config::{BundlerConfig, SourcePathMode};
use bungae_graph::{DeltaResult, Graph, IdAllocator};

use crate::error::Result;
use crate::serializer::{map_source_name, splice_tail, verbose_name};

/// Messages received from a connected client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrClientMessage {
    RegisterEntrypoints {
        #[serde(rename = "entryPoints")]
        entry_points: Vec<String>,
    },
    Log {
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        data: Vec<serde_json::Value>,
    },
    LogOptIn,
}

/// Messages sent to a connected client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrServerMessage {
    BundleRegistered,
    UpdateStart {
        body: UpdateStartBody,
    },
    Update {
        body: HmrUpdate,
    },
    UpdateDone,
    Error {
        body: HmrErrorBody,
    },
}

impl HmrServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateStartBody {
    #[serde(rename = "isInitialUpdate")]
    pub is_initial_update: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HmrErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

/// One added or modified module.
#[derive(Debug, Clone, Serialize)]
pub struct HmrModuleEntry {
    /// `[moduleId, code]`.
    pub module: (u32, String),
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    #[serde(rename = "sourceMappingURL", skip_serializing_if = "Option::is_none")]
    pub source_mapping_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HmrUpdate {
    #[serde(rename = "revisionId")]
    pub revision_id: String,
    #[serde(rename = "isInitialUpdate")]
    pub is_initial_update: bool,
    pub added: Vec<HmrModuleEntry>,
    pub modified: Vec<HmrModuleEntry>,
    pub deleted: Vec<u32>,
}

impl HmrUpdate {
    pub fn empty(revision_id: String, is_initial_update: bool) -> Self {
        Self {
            revision_id,
            is_initial_update,
            added: vec![],
            modified: vec![],
            deleted: vec![],
        }
    }
}

/// Build the update body for a computed delta.
///
/// New paths in `added`/`modified` receive ids through the session allocator
/// (stable for paths seen before); `deleted` ids come from the allocator's
/// existing table, which never forgets a path within a session.
pub fn build_update(
    delta: &DeltaResult,
    ids: &mut IdAllocator,
    config: &BundlerConfig,
    dev: bool,
    revision_id: String,
    is_initial_update: bool,
) -> Result<HmrUpdate> {
    let mut added = Vec::with_capacity(delta.added.len());
    for path in &delta.added {
        added.push(module_entry(&delta.graph, path, ids, config, dev)?);
    }
    let mut modified = Vec::with_capacity(delta.modified.len());
    for path in &delta.modified {
        modified.push(module_entry(&delta.graph, path, ids, config, dev)?);
    }
    let deleted = delta
        .deleted
        .iter()
        .filter_map(|path| ids.id_for(path))
        .collect();

    Ok(HmrUpdate {
        revision_id,
        is_initial_update,
        added,
        modified,
        deleted,
    })
}

fn module_entry(
    graph: &Graph,
    path: &Path,
    ids: &mut IdAllocator,
    config: &BundlerConfig,
    dev: bool,
) -> Result<HmrModuleEntry> {
    let module = graph
        .modules
        .get(path)
        .expect("delta paths exist in the new graph");
    let id = ids.get_or_assign(path);

    let dep_ids: Vec<String> = module
        .dependencies
        .iter()
        .map(|dep| match dep.path() {
            Some(dep_path) => ids.get_or_assign(dep_path).to_string(),
            None => "null".to_string(),
        })
        .collect();

    let inverse = collect_inverse_dependencies(graph, path, ids);
    let inverse_json = serde_json::to_string(&inverse)?;

    let mut tail = format!(",{id},[{}]", dep_ids.join(","));
    if dev {
        tail.push_str(&format!(",{:?}", verbose_name(path, config)));
    } else {
        tail.push_str(",null");
    }
    tail.push_str(&format!(",{inverse_json}"));

    let code = splice_tail(&module.code, &tail, path)?;
    Ok(HmrModuleEntry {
        module: (id, code),
        source_url: map_source_name(path, config, SourcePathMode::UrlServer),
        source_mapping_url: None,
    })
}

/// Inverse-dependency closure for the updated module: its id and the id of
/// every ancestor reachable by walking inverse edges, each mapped to the ids
/// of its direct parents. The visited set makes cycles terminate.
fn collect_inverse_dependencies(
    graph: &Graph,
    start: &Path,
    ids: &mut IdAllocator,
) -> BTreeMap<u32, Vec<u32>> {
    let mut result = BTreeMap::new();
    let mut stack = vec![start.to_path_buf()];
    while let Some(path) = stack.pop() {
        let id = ids.get_or_assign(&path);
        if result.contains_key(&id) {
            continue;
        }
        let parents: Vec<_> = graph
            .modules
            .get(&path)
            .map(|m| m.inverse_dependencies.iter().cloned().collect())
            .unwrap_or_default();
        let mut parent_ids: Vec<u32> = parents.iter().map(|p| ids.get_or_assign(p)).collect();
        parent_ids.sort_unstable();
        result.insert(id, parent_ids);
        stack.extend(parents);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use bungae_config::{BundleParams, Platform};
    use bungae_graph::{
        compute_delta, post_order, BuildOptions, CountingObserver, GraphBuilder,
    };
    use bungae_resolver::Resolver;
    use bungae_transform::TransformerAdapter;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, BundlerConfig) {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("TestBundle.js"),
            "const Bar=require('./Bar');const Foo=require('./Foo');module.exports={Foo,Bar};",
        )
        .unwrap();
        fs::write(dir.path().join("Foo.js"), "module.exports={foo:'foo'};").unwrap();
        fs::write(dir.path().join("Bar.js"), "module.exports={bar:'bar'};").unwrap();
        let config = BundlerConfig::new(dir.path().to_path_buf());
        (dir, config)
    }

    #[test]
    fn test_modified_module_keeps_its_id() {
        let (dir, config) = fixture();
        let resolver = Resolver::new(&config);
        let transformer = TransformerAdapter::new();
        let params = BundleParams::new(Platform::Ios);
        let builder = GraphBuilder::new(
            &config,
            &resolver,
            &transformer,
            None,
            BuildOptions {
                platform: params.platform,
                dev: true,
            },
        );
        let graph = builder
            .build(&dir.path().join("TestBundle.js"), &mut CountingObserver::default())
            .unwrap();

        let mut ids = IdAllocator::new();
        ids.assign_all(&post_order(&graph));
        let foo_id = ids.id_for(&dir.path().join("Foo.js")).unwrap();

        fs::write(dir.path().join("Foo.js"), "module.exports={foo:'FOO'};").unwrap();
        let delta = compute_delta(&builder, &graph, &[dir.path().join("Foo.js")]).unwrap();
        let update =
            build_update(&delta, &mut ids, &config, true, "2".to_string(), false).unwrap();

        assert!(update.added.is_empty());
        assert!(update.deleted.is_empty());
        assert_eq!(update.modified.len(), 1);
        assert_eq!(update.modified[0].module.0, foo_id);
        assert!(update.modified[0].module.1.contains("'FOO'"));
        // Inverse-dependency tail names the entry as Foo's parent.
        let entry_id = ids.id_for(&dir.path().join("TestBundle.js")).unwrap();
        assert!(update.modified[0]
            .module
            .1
            .contains(&format!("\"{foo_id}\":[{entry_id}]")));
    }

    #[test]
    fn test_deleted_ids_come_from_old_table() {
        let (dir, config) = fixture();
        let resolver = Resolver::new(&config);
        let transformer = TransformerAdapter::new();
        let builder = GraphBuilder::new(
            &config,
            &resolver,
            &transformer,
            None,
            BuildOptions {
                platform: Platform::Ios,
                dev: true,
            },
        );
        let graph = builder
            .build(&dir.path().join("TestBundle.js"), &mut CountingObserver::default())
            .unwrap();

        let mut ids = IdAllocator::new();
        ids.assign_all(&post_order(&graph));
        let bar_id = ids.id_for(&dir.path().join("Bar.js")).unwrap();

        fs::remove_file(dir.path().join("Bar.js")).unwrap();
        let delta = compute_delta(&builder, &graph, &[dir.path().join("Bar.js")]).unwrap();
        let update =
            build_update(&delta, &mut ids, &config, true, "2".to_string(), false).unwrap();

        assert_eq!(update.deleted, vec![bar_id]);
        assert!(!update.modified.is_empty());
    }

    #[test]
    fn test_wire_format() {
        let message = HmrServerMessage::UpdateStart {
            body: UpdateStartBody {
                is_initial_update: true,
            },
        };
        assert_eq!(
            message.to_json().unwrap(),
            r#"{"type":"update-start","body":{"isInitialUpdate":true}}"#
        );

        let done = HmrServerMessage::UpdateDone;
        assert_eq!(done.to_json().unwrap(), r#"{"type":"update-done"}"#);

        let update = HmrServerMessage::Update {
            body: HmrUpdate::empty("a1".to_string(), false),
        };
        let json = update.to_json().unwrap();
        assert!(json.contains(r#""type":"update""#));
        assert!(json.contains(r#""revisionId":"a1""#));
        assert!(json.contains(r#""deleted":[]"#));
    }

    #[test]
    fn test_client_message_parsing() {
        let parsed: HmrClientMessage = serde_json::from_str(
            r#"{"type":"register-entrypoints","entryPoints":["http://localhost:8081/index.bundle?platform=ios"]}"#,
        )
        .unwrap();
        assert!(matches!(
            parsed,
            HmrClientMessage::RegisterEntrypoints { entry_points } if entry_points.len() == 1
        ));

        let log: HmrClientMessage =
            serde_json::from_str(r#"{"type":"log","level":"info","data":["hello"]}"#).unwrap();
        assert!(matches!(log, HmrClientMessage::Log { .. }));

        let opt_in: HmrClientMessage = serde_json::from_str(r#"{"type":"log-opt-in"}"#).unwrap();
        assert!(matches!(opt_in, HmrClientMessage::LogOptIn));
    }
}

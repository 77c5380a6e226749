//! Shared dev-server state.
//!
//! Sessions are keyed by their configuration tuple; each holds at most one
//! outstanding build because requests serialize on the session's async
//! mutex, so concurrent bundle requests for the same tuple await the same
//! build and later ones hit the cached bytes. Sessions share the resolver,
//! transformer, and transform cache but no per-session state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use bungae_bundler::{
    build_update, serialize, BuildSession, CachedBundle, HmrServerMessage, HmrUpdate,
    SerializeOptions, SourceMapConsumer,
};
use bungae_config::{BundleParams, BundlerConfig};
use bungae_graph::{compute_delta, BuildOptions, GraphBuilder, ProgressObserver};
use bungae_resolver::Resolver;
use bungae_transform::{TransformCache, TransformerAdapter};

use crate::error::{CliError, Result};

/// One progress tick for multipart streaming.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ProgressTick {
    pub done: usize,
    pub total: usize,
}

/// Bundle bytes plus the metadata the HTTP layer attaches as headers.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub code: String,
    pub map_json: String,
    pub revision_hex: String,
    pub files_changed: usize,
}

pub struct ServerState {
    pub config: BundlerConfig,
    pub resolver: Resolver,
    pub transformer: TransformerAdapter,
    pub cache: TransformCache,
    sessions: RwLock<HashMap<BundleParams, Arc<Mutex<BuildSession>>>>,
    consumers: RwLock<HashMap<BundleParams, Arc<SourceMapConsumer>>>,
    clients: RwLock<HashMap<usize, mpsc::UnboundedSender<String>>>,
    next_client_id: RwLock<usize>,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
    pub fn new(config: BundlerConfig) -> Self {
        let resolver = Resolver::new(&config);
        let cache = TransformCache::new(
            config.cache_dir(),
            Duration::from_secs(config.cache_max_age_secs),
        );
        Self {
            config,
            resolver,
            transformer: TransformerAdapter::new(),
            cache,
            sessions: RwLock::new(HashMap::new()),
            consumers: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
            next_client_id: RwLock::new(0),
        }
    }

    /// Get or create the session for a configuration tuple.
    pub fn session(&self, params: BundleParams) -> Arc<Mutex<BuildSession>> {
        if let Some(session) = self.sessions.read().get(&params) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write();
        Arc::clone(
            sessions
                .entry(params)
                .or_insert_with(|| Arc::new(Mutex::new(BuildSession::new(params)))),
        )
    }

    pub fn sessions_snapshot(&self) -> Vec<Arc<Mutex<BuildSession>>> {
        self.sessions.read().values().cloned().collect()
    }

    // -- HMR client registry --

    pub fn register_client(&self) -> (usize, mpsc::UnboundedReceiver<String>) {
        let id = {
            let mut next = self.next_client_id.write();
            let id = *next;
            *next += 1;
            id
        };
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Send a raw frame to every connected client, dropping the ones whose
    /// channel is gone.
    pub fn broadcast_raw(&self, frame: &str) {
        let mut dead = Vec::new();
        {
            let clients = self.clients.read();
            for (id, tx) in clients.iter() {
                if tx.send(frame.to_string()).is_err() {
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            self.unregister_client(id);
        }
    }

    pub fn broadcast(&self, message: &HmrServerMessage) {
        match message.to_json() {
            Ok(frame) => self.broadcast_raw(&frame),
            Err(err) => tracing::warn!(%err, "failed to encode HMR frame"),
        }
    }

    // -- symbolication consumers --

    /// Cached map consumer for a session, built lazily from the session's
    /// composed map.
    pub fn consumer(&self, params: BundleParams, map_json: &str) -> Result<Arc<SourceMapConsumer>> {
        if let Some(consumer) = self.consumers.read().get(&params) {
            return Ok(Arc::clone(consumer));
        }
        let consumer = Arc::new(
            SourceMapConsumer::parse(map_json)
                .map_err(|e| CliError::Server(format!("bundle map unusable: {e}")))?,
        );
        self.consumers.write().insert(params, Arc::clone(&consumer));
        Ok(consumer)
    }

    fn drop_consumer(&self, params: &BundleParams) {
        self.consumers.write().remove(params);
    }

    // -- building --

    fn builder(&self, params: &BundleParams) -> GraphBuilder<'_> {
        GraphBuilder::new(
            &self.config,
            &self.resolver,
            &self.transformer,
            Some(&self.cache),
            BuildOptions {
                platform: params.platform,
                dev: params.dev,
            },
        )
    }

    /// Synchronous build-or-reuse for one session. Callers run this through
    /// `spawn_blocking`; the session mutex is held for the duration, which
    /// is what serializes concurrent requests for the same tuple.
    pub fn build_bundle_sync(
        &self,
        params: BundleParams,
        entry: &Path,
        progress: Option<mpsc::UnboundedSender<ProgressTick>>,
    ) -> Result<BuildOutcome> {
        let session_arc = self.session(params);
        let mut session = session_arc.blocking_lock();

        let entry_matches = session
            .graph
            .as_ref()
            .is_some_and(|graph| graph.entry == entry);

        if !entry_matches {
            let builder = self.builder(&params);
            let mut observer = ChannelObserver { progress };
            let graph = builder.build(entry, &mut observer)?;
            let files_changed = graph.modules.len();
            session.graph = Some(graph);
            session.bump_revision();
            session.cached = None;
            self.serialize_session(&mut session, files_changed)?;
        } else if session.cached.is_none() {
            let graph = session.graph.as_ref().expect("entry_matches implies graph");
            let files_changed = graph.modules.len();
            self.serialize_session(&mut session, files_changed)?;
        } else if let Some(progress_tx) = &progress {
            // Cache hit: report a single completed tick.
            let total = session
                .graph
                .as_ref()
                .map(|g| g.modules.len())
                .unwrap_or_default();
            let _ = progress_tx.send(ProgressTick {
                done: total,
                total,
            });
        }

        let cached = session.cached.as_ref().expect("session was just serialized");
        Ok(BuildOutcome {
            code: cached.code.clone(),
            map_json: cached.map_json.clone(),
            revision_hex: session.revision_hex(),
            files_changed: cached.files_changed,
        })
    }

    fn serialize_session(&self, session: &mut BuildSession, files_changed: usize) -> Result<()> {
        let params = session.params;
        let revision = session.revision_id();
        let graph = session
            .graph
            .as_mut()
            .expect("serialize requires a built graph");
        let output = serialize(
            graph,
            &mut session.ids,
            &self.config,
            &params,
            &SerializeOptions::default(),
        )?;
        let map_json = output.map_json()?;
        session.cached = Some(CachedBundle {
            code: output.code,
            map_json,
            revision,
            files_changed,
        });
        self.drop_consumer(&params);
        Ok(())
    }

    /// Apply a changed-file set to every session, returning the HMR updates
    /// to broadcast. Synchronous; run through `spawn_blocking`.
    pub fn apply_file_changes_sync(&self, changed: &[PathBuf]) -> Vec<HmrUpdate> {
        let mut updates = Vec::new();
        for session_arc in self.sessions_snapshot() {
            let mut session = session_arc.blocking_lock();
            let params = session.params;
            let Some(old_graph) = session.graph.take() else {
                continue;
            };

            let builder = self.builder(&params);
            let delta = match compute_delta(&builder, &old_graph, changed) {
                Ok(delta) => delta,
                Err(err) => {
                    tracing::error!(%err, "delta computation failed");
                    session.graph = Some(old_graph);
                    session.invalidate();
                    continue;
                }
            };

            if delta.is_empty() {
                session.graph = Some(delta.graph);
                continue;
            }

            let files_changed = delta.added.len() + delta.modified.len() + delta.deleted.len();
            session.bump_revision();
            let revision_hex = session.revision_hex();
            let update = match build_update(
                &delta,
                &mut session.ids,
                &self.config,
                params.dev,
                revision_hex,
                false,
            ) {
                Ok(update) => update,
                Err(err) => {
                    tracing::error!(%err, "HMR update construction failed");
                    session.graph = Some(delta.graph);
                    session.invalidate();
                    continue;
                }
            };

            session.graph = Some(delta.graph);
            session.invalidate();
            if let Err(err) = self.serialize_session(&mut session, files_changed) {
                tracing::error!(%err, "re-serialization after delta failed");
            }
            if params.dev {
                updates.push(update);
            }
        }
        updates
    }

    /// Resolve the entry module for a requested bundle name
    /// (`src/main.bundle` -> `<root>/src/main.<ext>`).
    pub fn resolve_entry(&self, name: &str, params: &BundleParams) -> Result<PathBuf> {
        let probe_from = self.config.root.join("__server__.js");
        let specifier = format!("./{name}");
        self.resolver
            .resolve(&probe_from, &specifier, params.platform, params.dev)
            .map_err(|_| {
                CliError::Graph(bungae_graph::GraphError::EntryMissing {
                    path: self.config.root.join(name),
                })
            })
    }
}

/// Bridges builder progress onto a tokio channel for multipart streaming.
struct ChannelObserver {
    progress: Option<mpsc::UnboundedSender<ProgressTick>>,
}

impl ProgressObserver for ChannelObserver {
    fn on_discovered(&mut self, _total: usize) {}

    fn on_processed(&mut self, processed: usize, total: usize) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(ProgressTick {
                done: processed,
                total,
            });
        }
    }
}

//! Sync engine: load → transform → embed/upsert → graph, then one cascade hop.
//!
//! A root sync runs its own model first, then syncs every model its
//! many2one fields point at, restricted to the referenced record ids.
//! Cascaded syncs never cascade further.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use nexsync_models::{RawRecord, SyncOptions, SyncResult, TransformedRecord};
use tracing::{debug, info, warn};

use super::cache::Caches;
use super::collector::collect_fk_targets;
use super::embeddings::Embedder;
use super::fk::{lookup, parse_positive_id};
use super::graph::GraphEdgeUpdater;
use super::identity::derive_data_identity;
use super::pipeline::BatchPipeline;
use super::schema::SchemaRegistry;
use super::source::RecordSource;
use super::stores::{GraphStore, IndexMaintainer, VectorStore};
use super::transform::transform_records;
use crate::error::{Error, Result};

/// Whether a model sync may fan out to its FK targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    /// Entry point of a sync request
    Root,
    /// Reached through an FK from a root sync
    Cascaded,
}

pub struct SyncEngine {
    schema: Arc<dyn SchemaRegistry>,
    source: Arc<dyn RecordSource>,
    store: Arc<dyn VectorStore>,
    indexes: Arc<dyn IndexMaintainer>,
    pipeline: BatchPipeline,
    graph: GraphEdgeUpdater,
    caches: Caches,
}

impl SyncEngine {
    pub fn new(
        schema: Arc<dyn SchemaRegistry>,
        source: Arc<dyn RecordSource>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        indexes: Arc<dyn IndexMaintainer>,
    ) -> Self {
        Self {
            schema,
            source,
            pipeline: BatchPipeline::new(embedder, store.clone()),
            store,
            indexes,
            graph: GraphEdgeUpdater::new(graph),
            caches: Caches::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.pipeline = self.pipeline.with_batch_size(batch_size);
        self
    }

    pub fn with_caches(mut self, caches: Caches) -> Self {
        self.caches = caches;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.pipeline.batch_size()
    }

    /// Sync one model and, unless disabled, the models it references.
    ///
    /// Never returns an error: fatal problems end up in
    /// [`SyncResult::errors`] with `success = false`.
    pub async fn sync(&self, model_name: &str, options: SyncOptions) -> SyncResult {
        let started = Instant::now();
        info!(
            model = %model_name,
            dry_run = options.dry_run,
            skip_cascade = options.skip_cascade,
            force = options.force,
            "Sync started"
        );

        if options.force && !options.dry_run {
            self.caches.invalidate_all().await;
        }

        let (mut result, loaded) = self
            .sync_model(model_name, &options, CascadeState::Root, None)
            .await;
        let mut wrote = result.records_synced > 0;

        if let Some(records) = loaded {
            if !options.skip_cascade && !options.dry_run {
                let (cascaded, cascaded_wrote) = self.cascade(model_name, &records, &options).await;
                wrote |= cascaded_wrote;
                result.cascaded_models = Some(cascaded);
            }
        }

        if wrote {
            self.caches.invalidate_all().await;
        }

        let result = result.finish(started.elapsed().as_millis() as u64);
        info!(
            model = %model_name,
            success = result.success,
            read = result.records_read,
            synced = result.records_synced,
            failed = result.records_failed,
            skipped = result.records_skipped,
            duration_ms = result.duration_ms,
            "Sync finished"
        );
        result
    }

    /// Sync every model with a data file, one after another, without cascade.
    pub async fn sync_all(&self) -> Result<Vec<SyncResult>> {
        let stems = self.source.discover().await?;
        let known = self.schema.model_names().await?;
        info!(files = stems.len(), "Syncing all discovered models");

        let mut results = Vec::with_capacity(stems.len());
        for stem in stems {
            let model_name = resolve_model_name(&stem, &known);
            results.push(
                self.sync(&model_name, SyncOptions::new().skip_cascade())
                    .await,
            );
        }
        Ok(results)
    }

    /// Visit each FK target model once, sequentially.
    ///
    /// Returns the models whose nested sync succeeded and whether any of
    /// them wrote records.
    async fn cascade(
        &self,
        model_name: &str,
        records: &[RawRecord],
        options: &SyncOptions,
    ) -> (Vec<String>, bool) {
        let fk_fields = match self.schema.fk_fields(model_name).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(model = %model_name, error = %e, "Cascade skipped, FK fields unavailable");
                return (Vec::new(), false);
            }
        };

        let targets = collect_fk_targets(records, &fk_fields);
        let nested_options = SyncOptions {
            file_path: None,
            skip_cascade: true,
            dry_run: false,
            force: options.force,
        };

        let mut cascaded = Vec::new();
        let mut wrote = false;
        for (target, ids) in targets {
            if target == model_name {
                debug!(model = %model_name, "Self-referencing FK, not cascading");
                continue;
            }

            debug!(model = %model_name, target = %target, count = ids.len(), "Cascading");
            let (nested, _) = self
                .sync_model(&target, &nested_options, CascadeState::Cascaded, Some(ids))
                .await;
            wrote |= nested.records_synced > 0;

            if nested.errors.is_empty() {
                cascaded.push(target);
            } else {
                warn!(
                    model = %model_name,
                    target = %target,
                    errors = ?nested.errors,
                    "Cascaded sync failed"
                );
            }
        }

        (cascaded, wrote)
    }

    /// One model, one pass. `target_ids` restricts a cascaded sync to the
    /// referenced records. The loaded records come back unless the pass
    /// failed fatally.
    async fn sync_model(
        &self,
        model_name: &str,
        options: &SyncOptions,
        state: CascadeState,
        target_ids: Option<BTreeSet<i64>>,
    ) -> (SyncResult, Option<Vec<RawRecord>>) {
        let mut result = SyncResult::new(model_name);

        let model_id = match self.resolve_model(model_name).await {
            Ok(id) => id,
            Err(e) => return (result.fail(e.to_string()), None),
        };
        result.model_id = Some(model_id);

        let mut records = match self
            .source
            .load(model_name, options.file_path.as_deref())
            .await
        {
            Ok(records) => records,
            Err(e) => return (result.fail(e.to_string()), None),
        };

        if let Some(ids) = &target_ids {
            records.retain(|r| {
                lookup(r, "id")
                    .and_then(parse_positive_id)
                    .is_some_and(|id| ids.contains(&id))
            });
        }
        result.records_read = records.len();

        if options.dry_run {
            debug!(model = %model_name, count = records.len(), "Dry run, nothing written");
            return (result, Some(records));
        }

        let fields = match self.schema.model_fields(model_name).await {
            Ok(fields) => fields,
            Err(e) => return (result.fail(e.to_string()), None),
        };
        let mut transformed = match transform_records(&records, model_name, model_id, &fields) {
            Ok(transformed) => transformed,
            Err(e) => return (result.fail(e.to_string()), None),
        };
        result.records_skipped = records.len() - transformed.len();

        if state == CascadeState::Cascaded && !options.force {
            let before = transformed.len();
            let existing = self.existing_identities(model_name, model_id, &transformed).await;
            transformed.retain(|r| {
                derive_data_identity(model_id, r.record_id)
                    .map(|id| !existing.contains(&id.to_string()))
                    .unwrap_or(true)
            });
            result.records_skipped += before - transformed.len();
        }

        if transformed.is_empty() {
            debug!(model = %model_name, "Nothing to write");
            return (result, Some(records));
        }

        let outcome = self.pipeline.run(&transformed).await;
        result.records_synced = outcome.synced;
        result.records_failed = outcome.failed;
        result.errors.extend(outcome.errors);

        if state == CascadeState::Root && outcome.synced > 0 {
            let update = self
                .graph
                .update(model_name, model_id, &records, &fields)
                .await;
            debug!(model = %model_name, edges = update.edges_created, "Graph updated");
        }

        if let Err(e) = self.indexes.ensure_indexes(model_name, &fields).await {
            warn!(model = %model_name, error = %e, "Failed to ensure payload indexes");
        }

        (result, Some(records))
    }

    async fn resolve_model(&self, model_name: &str) -> Result<i64> {
        if !self.schema.model_exists(model_name).await? {
            return Err(Error::ModelNotFound(model_name.to_string()));
        }
        self.schema.model_id(model_name).await?.ok_or_else(|| {
            Error::Validation(format!("Could not resolve model id for {}", model_name))
        })
    }

    /// Identities of `records` already in the store. Lookup failures count
    /// as "none stored" so the records get synced.
    async fn existing_identities(
        &self,
        model_name: &str,
        model_id: i64,
        records: &[TransformedRecord],
    ) -> HashSet<String> {
        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| derive_data_identity(model_id, r.record_id).ok())
            .map(|id| id.to_string())
            .collect();

        match self.store.existing_ids(&ids).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(model = %model_name, error = %e, "Existence lookup failed");
                Default::default()
            }
        }
    }
}

/// Map a data-file stem to a registered model name: verbatim first, then
/// any model whose dotted name matches once dots become underscores.
pub fn resolve_model_name(stem: &str, known: &[String]) -> String {
    if known.iter().any(|m| m == stem) {
        return stem.to_string();
    }
    known
        .iter()
        .find(|m| m.replace('.', "_") == stem)
        .cloned()
        .unwrap_or_else(|| stem.to_string())
}

//! Sync request and result models

use serde::{Deserialize, Serialize};

/// Options for a single model sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Explicit source file; otherwise the record source resolves one by model name
    pub file_path: Option<String>,
    /// Do not sync FK-referenced models after this one
    pub skip_cascade: bool,
    /// Load records and report counts without transforming or writing
    pub dry_run: bool,
    /// Re-sync cascade targets even when they already exist in the store
    pub force: bool,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn skip_cascade(mut self) -> Self {
        self.skip_cascade = true;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Outcome of one model sync.
///
/// Built up while the sync runs and returned once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub model_name: String,
    pub model_id: Option<i64>,
    /// Raw records loaded from the source, including ones later skipped
    pub records_read: usize,
    pub records_synced: usize,
    pub records_failed: usize,
    /// Records excluded before embedding (missing id, or already stored during cascade)
    pub records_skipped: usize,
    pub duration_ms: u64,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascaded_models: Option<Vec<String>>,
}

impl SyncResult {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            success: false,
            model_name: model_name.into(),
            model_id: None,
            records_read: 0,
            records_synced: 0,
            records_failed: 0,
            records_skipped: 0,
            duration_ms: 0,
            errors: Vec::new(),
            cascaded_models: None,
        }
    }

    /// Record a fatal error. The result keeps whatever counts it had.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self.success = false;
        self
    }

    /// Stamp the duration and derive `success` from the error list.
    pub fn finish(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self.success = self.errors.is_empty();
        self
    }
}

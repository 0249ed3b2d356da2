//! File-backed store
//!
//! Layout under the root directory:
//! - `sources.json`: source configs, fetch status and reference codes
//! - `records/<source id>.csv`: latest record batch per source
//! - `store.lock`: advisory lock shared by all writers
//!
//! Every file is replaced atomically (temp file, fsync, rename), so a failed
//! write leaves the previous contents intact.

use async_trait::async_trait;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    summarize_replacement, ReferenceCodes, SourceConfig, SourceStore, StatusUpdate, StoreError,
    StoreResult, StoredRecord, WriteSummary,
};

/// State document file name.
pub const STATE_FILE: &str = "sources.json";

/// Directory holding per-source record files.
pub const RECORDS_DIR: &str = "records";

const LOCK_FILE: &str = "store.lock";

/// Current state document version.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Maximum state document size (10 MB).
pub const MAX_STATE_FILE_SIZE: u64 = 10 * 1024 * 1024;

fn schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Contents of `sources.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Document version
    #[serde(default = "schema_version")]
    pub schema_version: String,
    /// Configured sources
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Valid region codes; absent means unchecked
    #[serde(default)]
    pub region_codes: Option<Vec<String>>,
    /// Valid industry codes; absent means unchecked
    #[serde(default)]
    pub industry_codes: Option<Vec<String>>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            schema_version: schema_version(),
            sources: Vec::new(),
            region_codes: None,
            industry_codes: None,
        }
    }
}

/// Store rooted at a directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileStore {
    /// Open (and initialize if needed) a store under `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(RECORDS_DIR)).map_err(io_error)?;

        let store = Self {
            root,
            guard: Mutex::new(()),
        };

        if !store.state_path().exists() {
            info!(path = %store.state_path().display(), "Initializing empty store");
            store.save_document(&StoreDocument::default())?;
        }

        Ok(store)
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `sources.json`.
    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    /// Path of a source's record file.
    pub fn records_path(&self, source_id: &str) -> PathBuf {
        self.root
            .join(RECORDS_DIR)
            .join(format!("{}.csv", records_file_stem(source_id)))
    }

    fn lock_file(&self) -> StoreResult<File> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.root.join(LOCK_FILE))
            .map_err(|e| StoreError::Lock(format!("Failed to create lock file: {e}")))
    }

    /// Load the state document under a shared lock.
    pub fn load_document(&self) -> StoreResult<StoreDocument> {
        let lock = RwLock::new(self.lock_file()?);
        let _guard = lock
            .read()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire read lock: {e}")))?;
        self.read_document()
    }

    /// Replace the state document under an exclusive lock.
    pub fn save_document(&self, document: &StoreDocument) -> StoreResult<()> {
        let mut lock = RwLock::new(self.lock_file()?);
        let _guard = lock
            .write()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire write lock: {e}")))?;
        self.write_document(document)
    }

    /// Apply `change` to the state document under an exclusive lock.
    pub fn modify_document<T>(
        &self,
        change: impl FnOnce(&mut StoreDocument) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut lock = RwLock::new(self.lock_file()?);
        let _guard = lock
            .write()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire write lock: {e}")))?;
        let mut document = self.read_document()?;
        let result = change(&mut document)?;
        self.write_document(&document)?;
        Ok(result)
    }

    /// Insert or replace a source configuration.
    pub async fn upsert_source(&self, source: SourceConfig) -> StoreResult<()> {
        source.validate().map_err(StoreError::Serialization)?;
        let _guard = self.guard.lock().await;
        self.modify_document(|doc| {
            let stem = records_file_stem(&source.id);
            if let Some(other) = doc
                .sources
                .iter()
                .find(|s| s.id != source.id && records_file_stem(&s.id) == stem)
            {
                return Err(StoreError::IdConflict {
                    id: source.id.clone(),
                    existing: other.id.clone(),
                });
            }
            match doc.sources.iter_mut().find(|s| s.id == source.id) {
                Some(existing) => *existing = source,
                None => doc.sources.push(source),
            }
            Ok(())
        })
    }

    /// Records currently stored for a source.
    pub fn read_records(&self, source_id: &str) -> StoreResult<Vec<StoredRecord>> {
        let path = self.records_path(source_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| StoreError::Io(format!("Failed to open {}: {e}", path.display())))?;
        reader
            .deserialize()
            .collect::<Result<Vec<StoredRecord>, _>>()
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
    }

    fn read_document(&self) -> StoreResult<StoreDocument> {
        let path = self.state_path();
        let metadata = std::fs::metadata(&path).map_err(io_error)?;
        if metadata.len() > MAX_STATE_FILE_SIZE {
            return Err(StoreError::StateTooLarge {
                size: metadata.len(),
                max: MAX_STATE_FILE_SIZE,
            });
        }

        let contents = std::fs::read_to_string(&path).map_err(io_error)?;
        let document: StoreDocument = serde_json::from_str(&contents).map_err(|e| {
            warn!(error = %e, "Failed to deserialize store document");
            StoreError::Serialization(e.to_string())
        })?;

        if document.schema_version != SCHEMA_VERSION {
            return Err(StoreError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: document.schema_version,
            });
        }
        Ok(document)
    }

    fn write_document(&self, document: &StoreDocument) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&self.state_path(), |file| {
            file.write_all(json.as_bytes()).map_err(io_error)
        })?;
        debug!(sources = document.sources.len(), "Store document saved");
        Ok(())
    }

    fn write_records(&self, source_id: &str, rows: &[StoredRecord]) -> StoreResult<()> {
        write_atomic(&self.records_path(source_id), |file| {
            let mut writer = csv::Writer::from_writer(file);
            for row in rows {
                writer
                    .serialize(row)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
            }
            writer.flush().map_err(io_error)
        })
    }
}

/// Write through a temp file in the target directory, then rename over `path`.
fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut NamedTempFile) -> StoreResult<()>,
) -> StoreResult<()> {
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(parent_dir)
        .map_err(|e| StoreError::Io(format!("Failed to create temp file: {e}")))?;

    write(&mut temp_file)?;

    temp_file
        .flush()
        .map_err(|e| StoreError::Io(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| StoreError::Io(format!("Failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| StoreError::Io(format!("Failed to persist temp file: {e}")))?;

    // Make the rename durable.
    if let Ok(dir) = File::open(parent_dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

fn io_error(e: std::io::Error) -> StoreError {
    StoreError::Io(e.to_string())
}

#[async_trait]
impl SourceStore for FileStore {
    async fn get_source(&self, id: &str) -> StoreResult<Option<SourceConfig>> {
        let document = self.load_document()?;
        Ok(document.sources.into_iter().find(|s| s.id == id))
    }

    async fn list_active_sources(&self) -> StoreResult<Vec<SourceConfig>> {
        let document = self.load_document()?;
        Ok(document.sources.into_iter().filter(|s| s.is_active).collect())
    }

    async fn reference_codes(&self) -> StoreResult<ReferenceCodes> {
        let document = self.load_document()?;
        Ok(ReferenceCodes {
            regions: document.region_codes.map(|c| c.into_iter().collect()),
            industries: document.industry_codes.map(|c| c.into_iter().collect()),
        })
    }

    async fn write_batch(&self, source_id: &str, rows: Vec<StoredRecord>) -> StoreResult<WriteSummary> {
        let _guard = self.guard.lock().await;
        let mut lock = RwLock::new(self.lock_file()?);
        let _file_guard = lock
            .write()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire write lock: {e}")))?;

        let previous = self.read_records(source_id)?;
        let summary = summarize_replacement(&previous, &rows);
        self.write_records(source_id, &rows)?;

        info!(
            source_id = %source_id,
            rows = rows.len(),
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            "Record batch written"
        );
        Ok(summary)
    }

    async fn update_status(&self, source_id: &str, update: StatusUpdate) -> StoreResult<()> {
        let _guard = self.guard.lock().await;
        self.modify_document(|doc| {
            let source = doc
                .sources
                .iter_mut()
                .find(|s| s.id == source_id)
                .ok_or_else(|| StoreError::NotFound(source_id.to_string()))?;
            source.status.apply(&update);
            Ok(())
        })
    }
}

/// File name stem for a source's records; ids that differ only in
/// characters outside `[A-Za-z0-9._-]` share a stem.
fn records_file_stem(source_id: &str) -> String {
    source_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

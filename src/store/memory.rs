//! In-memory store

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::{
    summarize_replacement, ReferenceCodes, SourceConfig, SourceStore, StatusUpdate, StoreError,
    StoreResult, StoredRecord, WriteSummary,
};

#[derive(Debug, Default)]
struct MemoryState {
    sources: BTreeMap<String, SourceConfig>,
    reference: ReferenceCodes,
    records: HashMap<String, Vec<StoredRecord>>,
}

/// Store kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    /// Empty store without reference codes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source.
    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.state
            .get_mut()
            .sources
            .insert(source.id.clone(), source);
        self
    }

    /// Set the valid region codes.
    pub fn with_region_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.get_mut().reference.regions = Some(collect_codes(codes));
        self
    }

    /// Set the valid industry codes.
    pub fn with_industry_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.get_mut().reference.industries = Some(collect_codes(codes));
        self
    }

    /// Add a region code at runtime.
    pub async fn add_region_code(&self, code: impl Into<String>) {
        self.state
            .write()
            .await
            .reference
            .regions
            .get_or_insert_with(HashSet::new)
            .insert(code.into());
    }

    /// Current copy of a source.
    pub async fn source(&self, id: &str) -> Option<SourceConfig> {
        self.state.read().await.sources.get(id).cloned()
    }

    /// Records currently stored for a source.
    pub async fn records(&self, source_id: &str) -> Vec<StoredRecord> {
        self.state
            .read()
            .await
            .records
            .get(source_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn collect_codes<I, S>(codes: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    codes.into_iter().map(Into::into).collect()
}

#[async_trait]
impl SourceStore for InMemoryStore {
    async fn get_source(&self, id: &str) -> StoreResult<Option<SourceConfig>> {
        Ok(self.source(id).await)
    }

    async fn list_active_sources(&self) -> StoreResult<Vec<SourceConfig>> {
        Ok(self
            .state
            .read()
            .await
            .sources
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn reference_codes(&self) -> StoreResult<ReferenceCodes> {
        Ok(self.state.read().await.reference.clone())
    }

    async fn write_batch(&self, source_id: &str, rows: Vec<StoredRecord>) -> StoreResult<WriteSummary> {
        let mut state = self.state.write().await;
        let summary = match state.records.get(source_id) {
            Some(previous) => summarize_replacement(previous, &rows),
            None => summarize_replacement(&[], &rows),
        };
        state.records.insert(source_id.to_string(), rows);
        Ok(summary)
    }

    async fn update_status(&self, source_id: &str, update: StatusUpdate) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let source = state
            .sources
            .get_mut(source_id)
            .ok_or_else(|| StoreError::NotFound(source_id.to_string()))?;
        source.status.apply(&update);
        Ok(())
    }
}

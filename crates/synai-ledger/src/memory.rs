use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entry::{LedgerEntry, NewLedgerEntry};
use crate::traits::Ledger;
use synai_types::RelayError;

/// In-memory ledger implementation (default).
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    index_by_task: Arc<DashMap<Uuid, Vec<usize>>>,
    index_by_target: Arc<DashMap<String, Vec<usize>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::from_entries(Vec::new())
    }

    /// Rebuild a ledger from previously persisted entries. Ids are kept as-is and
    /// new entries continue after the highest one.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let mut ledger = Self {
            entries: Arc::new(RwLock::new(Vec::with_capacity(entries.len()))),
            index_by_task: Arc::new(DashMap::new()),
            index_by_target: Arc::new(DashMap::new()),
        };
        for (idx, entry) in entries.iter().enumerate() {
            ledger.index(idx, entry);
        }
        ledger.entries = Arc::new(RwLock::new(entries));
        ledger
    }

    fn index(&self, idx: usize, entry: &LedgerEntry) {
        if let Some(task_id) = entry.task_id {
            self.index_by_task.entry(task_id).or_default().push(idx);
        }
        self.index_by_target
            .entry(entry.target_id.clone())
            .or_default()
            .push(idx);
    }

    fn collect(entries: &[LedgerEntry], indices: Option<&Vec<usize>>) -> Vec<LedgerEntry> {
        indices
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| entries.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn append_all(
        &self,
        entries: Vec<NewLedgerEntry>,
    ) -> Result<Vec<LedgerEntry>, RelayError> {
        // One write guard for the whole batch keeps ids contiguous.
        let mut stored = self.entries.write().await;
        let mut next_id = stored.last().map(|e| e.id + 1).unwrap_or(1);

        let mut appended = Vec::with_capacity(entries.len());
        for new in entries {
            let entry = LedgerEntry::from_new(next_id, new);
            next_id += 1;

            let idx = stored.len();
            self.index(idx, &entry);
            stored.push(entry.clone());
            appended.push(entry);
        }
        Ok(appended)
    }

    async fn query_by_task(&self, task_id: Uuid) -> Result<Vec<LedgerEntry>, RelayError> {
        let entries = self.entries.read().await;
        let indices = self.index_by_task.get(&task_id);
        Ok(Self::collect(&entries, indices.as_deref()))
    }

    async fn query_by_target(&self, target_id: &str) -> Result<Vec<LedgerEntry>, RelayError> {
        let entries = self.entries.read().await;
        let indices = self.index_by_target.get(target_id);
        Ok(Self::collect(&entries, indices.as_deref()))
    }

    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, RelayError> {
        let entries = self.entries.read().await;
        Ok(entries.clone())
    }
}

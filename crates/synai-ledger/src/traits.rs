use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entry::{LedgerEntry, NewLedgerEntry};
use synai_types::RelayError;

/// Append-only transfer ledger. All implementations must satisfy this.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append several entries as one unit: either all are recorded or none.
    async fn append_all(&self, entries: Vec<NewLedgerEntry>)
    -> Result<Vec<LedgerEntry>, RelayError>;

    /// Entries recorded for a task.
    async fn query_by_task(&self, task_id: Uuid) -> Result<Vec<LedgerEntry>, RelayError>;

    /// Entries credited to an account.
    async fn query_by_target(&self, target_id: &str) -> Result<Vec<LedgerEntry>, RelayError>;

    /// Sum of all amounts credited to an account.
    async fn total_received(&self, target_id: &str) -> Result<Decimal, RelayError> {
        Ok(self
            .query_by_target(target_id)
            .await?
            .iter()
            .map(|e| e.amount)
            .sum())
    }

    /// Get all entries (for auditing and snapshots).
    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, RelayError>;
}

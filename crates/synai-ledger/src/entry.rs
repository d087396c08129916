use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use synai_types::{FeeSplit, PLATFORM_ACCOUNT, PLATFORM_ADMIN_ACCOUNT};

/// Types of ledger transfers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    TaskPayout,
    PlatformFee,
}

/// A transfer that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub source_id: String,
    pub target_id: String,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub task_id: Option<Uuid>,
}

impl NewLedgerEntry {
    /// The two transfers recorded for one settled task: payout first, then fee.
    pub fn settlement(task_id: Uuid, agent_id: &str, split: &FeeSplit) -> [NewLedgerEntry; 2] {
        [
            NewLedgerEntry {
                source_id: PLATFORM_ACCOUNT.to_string(),
                target_id: agent_id.to_string(),
                amount: split.payout,
                transaction_type: TransactionType::TaskPayout,
                task_id: Some(task_id),
            },
            NewLedgerEntry {
                source_id: PLATFORM_ACCOUNT.to_string(),
                target_id: PLATFORM_ADMIN_ACCOUNT.to_string(),
                amount: split.fee,
                transaction_type: TransactionType::PlatformFee,
                task_id: Some(task_id),
            },
        ]
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: u64,
    pub source_id: String,
    pub target_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_new(id: u64, entry: NewLedgerEntry) -> Self {
        Self {
            id,
            source_id: entry.source_id,
            target_id: entry.target_id,
            amount: entry.amount,
            transaction_type: entry.transaction_type,
            task_id: entry.task_id,
            created_at: Utc::now(),
        }
    }
}

use std::sync::Arc;

use synai_reporting::Reporter;
use synai_settlement::SettlementEngine;
use synai_store::FileStore;
use synai_wallet::WalletIssuer;

use crate::config::RelayConfig;

#[derive(Clone)]
pub struct AppState {
    pub engine: SettlementEngine,
    pub reporter: Reporter,
}

impl AppState {
    pub fn new(engine: SettlementEngine, ranking_limit: usize) -> Self {
        let reporter = Reporter::new(
            engine.jobs().clone(),
            engine.agents().clone(),
            engine.owners().clone(),
            engine.ledger().clone(),
        )
        .with_limit(ranking_limit);
        Self { engine, reporter }
    }

    /// Volatile state, used by tests and `persist = false`.
    pub fn in_memory(wallets: Arc<dyn WalletIssuer>) -> Self {
        Self::new(
            SettlementEngine::in_memory(wallets),
            synai_reporting::DEFAULT_RANKING_LIMIT,
        )
    }

    pub fn from_config(config: &RelayConfig, wallets: Arc<dyn WalletIssuer>) -> anyhow::Result<Self> {
        let engine = if config.persist {
            SettlementEngine::open(FileStore::new(&config.state_dir), wallets)?
        } else {
            SettlementEngine::in_memory(wallets)
        };
        Ok(Self::new(engine, config.ranking_limit))
    }
}

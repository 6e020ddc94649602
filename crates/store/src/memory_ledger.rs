//! In-memory history ledger: useful for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use storyverse_core::error::LedgerError;
use storyverse_core::ledger::{HistoryLedger, LedgerEntry};
use tokio::sync::RwLock;

pub struct InMemoryHistoryLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    fail_appends: AtomicBool,
}

impl InMemoryHistoryLedger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            fail_appends: AtomicBool::new(false),
        }
    }

    /// Make every subsequent append fail.
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryHistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryLedger for InMemoryHistoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage("appends disabled".into()));
        }
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.entries.read().await.clone())
    }
}

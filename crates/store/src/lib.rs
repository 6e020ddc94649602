//! Universe store and history ledger implementations for Storyverse.

pub mod codec;
pub mod file_store;
pub mod in_memory;
pub mod jsonl_ledger;
pub mod legacy;
pub mod memory_ledger;

pub use codec::{decode_universe, encode_universe};
pub use file_store::FileUniverseStore;
pub use in_memory::InMemoryUniverseStore;
pub use jsonl_ledger::JsonlHistoryLedger;
pub use legacy::{import_legacy, LegacyImport};
pub use memory_ledger::InMemoryHistoryLedger;

//! # Storyverse Core
//!
//! Domain types, traits, and error definitions for the Storyverse universe
//! engine. This crate performs **no I/O**: it defines the domain model that
//! the store, engine, and provider crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping the LLM / diffusion backends via configuration
//! - Testing the integration logic against in-memory stores and scripted generators
//! - Clean dependency graph (all crates depend inward on core)

pub mod collaborator;
pub mod context;
pub mod entity;
pub mod error;
pub mod id;
pub mod ledger;
pub mod relation;
pub mod store;
pub mod story;
pub mod universe;

// Re-export key types at crate root for ergonomics
pub use collaborator::{DocumentComposer, ImageRenderer, StoryGenerator};
pub use context::{Context, ContextStats, RelatedEntity, StoryRequest};
pub use entity::{names_match, Character, Location};
pub use error::{Error, ErrorCategory, Result, ValidationError};
pub use id::{EntityId, EntityKind, IdAllocator};
pub use ledger::{ArtifactKind, ArtifactRecord, HistoryLedger, LedgerEntry, StoryDelta};
pub use relation::{Event, Relationship};
pub use store::UniverseStore;
pub use story::{EventDraft, RelationshipDraft, Story, StoryDraft, AGE_GROUPS, THEMES};
pub use universe::Universe;

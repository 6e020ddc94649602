//! Error types for the Storyverse domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use crate::id::{EntityId, EntityKind};
use thiserror::Error;

/// The top-level error type for all Storyverse operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Persistence ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // --- Core pipeline ---
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),

    #[error("Invalid record: {0}")]
    Validation(#[from] ValidationError),

    // --- External collaborators ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Image generation error: {0}")]
    Image(#[from] ImageError),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    // --- Lookup ---
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an error for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request referenced something that does not exist or is malformed.
    InvalidInput,
    /// An external collaborator failed or timed out; a manual retry may work.
    ServiceUnavailable,
    /// Persisted state is unreadable or a write failed.
    InternalCorruption,
}

impl ErrorCategory {
    /// Short label suitable for prefixing CLI/UI messages.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "fix your input",
            ErrorCategory::ServiceUnavailable => "service unavailable",
            ErrorCategory::InternalCorruption => "internal corruption",
        }
    }
}

impl Error {
    /// Build a not-found error for an entity of the given kind.
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.name(),
            id: id.into(),
        }
    }

    /// Which message category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Store(_) | Error::Ledger(_) | Error::Serialization(_) | Error::Internal(_) => {
                ErrorCategory::InternalCorruption
            }
            Error::Generation(_) | Error::Image(_) | Error::Compose(_) => {
                ErrorCategory::ServiceUnavailable
            }
            Error::Resolve(_)
            | Error::Context(_)
            | Error::Integration(_)
            | Error::Validation(_)
            | Error::NotFound { .. }
            | Error::Config { .. } => ErrorCategory::InvalidInput,
        }
    }
}

// --- Bounded context errors ---

/// Rejection of a malformed record at construction or load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },

    #[error("a relationship needs at least two participants, found {found}")]
    TooFewParticipants { found: usize },

    #[error("id {id} is not a {expected} id")]
    WrongIdKind { id: EntityId, expected: &'static str },

    #[error("record stored under key {key} carries id {id}")]
    KeyMismatch { key: EntityId, id: EntityId },

    #[error("{owner} references unknown entity {target}")]
    UnresolvedReference { owner: EntityId, target: EntityId },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Universe document at {location} is corrupt: {reason}")]
    Corrupt { location: String, reason: String },

    #[error("Failed to persist universe to {location}: {reason}")]
    Persistence { location: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Entity reference is empty")]
    EmptyReference,

    #[error("Reference {reference} is not a {expected} id")]
    KindMismatch {
        reference: String,
        expected: &'static str,
    },

    #[error("No {kind} matches reference {reference}")]
    Unknown {
        reference: String,
        kind: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Story request references unknown entities: {}", join_ids(.missing))]
    InsufficientContext { missing: Vec<EntityId> },

    #[error("Story request must name at least one character")]
    NoCharacters,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrationError {
    #[error("Story references unknown entities: {}", join_ids(.ids))]
    DanglingReference { ids: Vec<EntityId> },

    #[error("Story draft is incomplete: {0}")]
    IncompleteDraft(String),

    #[error("Merged record is invalid: {0}")]
    InvalidRecord(#[from] ValidationError),
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Story generation failed: {0}")]
    Failed(String),

    #[error("Story generation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Generated story could not be parsed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("Image generation failed: {0}")]
    Failed(String),

    #[error("Image generation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("No image recorded for story {story_id}")]
    MissingImage { story_id: EntityId },

    #[error("Document composition failed: {0}")]
    Failed(String),
}

fn join_ids(ids: &[EntityId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_reference_lists_ids() {
        let err = Error::Integration(IntegrationError::DanglingReference {
            ids: vec![EntityId::from("CHAR2025010100001"), EntityId::from("LOC2025010100009")],
        });
        let text = err.to_string();
        assert!(text.contains("CHAR2025010100001"));
        assert!(text.contains("LOC2025010100009"));
    }

    #[test]
    fn categories_separate_input_service_and_corruption() {
        let input = Error::Context(ContextError::InsufficientContext { missing: vec![] });
        let service = Error::Generation(GenerationError::Timeout { timeout_secs: 30 });
        let corrupt = Error::Store(StoreError::Corrupt {
            location: "universe.json".into(),
            reason: "expected value".into(),
        });

        assert_eq!(input.category(), ErrorCategory::InvalidInput);
        assert_eq!(service.category(), ErrorCategory::ServiceUnavailable);
        assert_eq!(corrupt.category(), ErrorCategory::InternalCorruption);
        assert_ne!(input.category().label(), service.category().label());
    }

    #[test]
    fn not_found_names_the_kind() {
        let err = Error::not_found(EntityKind::Story, "STORY2025010100001");
        assert_eq!(err.to_string(), "Story not found: STORY2025010100001");
    }
}

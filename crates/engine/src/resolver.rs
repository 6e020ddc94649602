//! Entity resolution: map a name or id to a record, staging a new one
//! when nothing matches.
//!
//! Policy, in order:
//! 1. exact id (universe, then staged)
//! 2. exact name ignoring case (universe, then staged)
//! 3. fuzzy match, only when the best candidate clears the threshold and
//!    beats the runner-up by the separation margin
//! 4. otherwise stage a provisional record
//!
//! Ambiguity always falls through to a new entity: two distinct characters
//! are never merged silently.

use serde::{Deserialize, Serialize};
use storyverse_config::ResolverConfig;
use storyverse_core::error::ResolveError;
use storyverse_core::{names_match, EntityId, EntityKind, Universe};
use tracing::{debug, info};

use crate::similarity::name_similarity;
use crate::staging::StagedEntities;

/// Fuzzy matching parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// Minimum score for a fuzzy match
    pub threshold: f32,
    /// Required gap between best and runner-up
    pub margin: f32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            margin: 0.1,
        }
    }
}

impl From<&ResolverConfig> for MatchPolicy {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            margin: config.separation_margin,
        }
    }
}

/// How a reference was matched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchOutcome {
    ExactId,
    ExactName,
    Fuzzy { score: f32 },
    /// No match; a provisional record was staged
    Staged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub id: EntityId,
    pub outcome: MatchOutcome,
}

pub struct EntityResolver {
    policy: MatchPolicy,
}

impl EntityResolver {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Resolve `reference` to an entity of `kind`, staging a new character or
    /// location when nothing matches.
    ///
    /// Relationships, events and stories can only be resolved by id.
    pub fn resolve(
        &self,
        reference: &str,
        kind: EntityKind,
        universe: &Universe,
        staged: &mut StagedEntities,
    ) -> Result<Resolution, ResolveError> {
        if let Some(found) = self.lookup(reference, kind, universe, staged)? {
            return Ok(found);
        }

        let name = reference.trim();
        let staged_id = match kind {
            EntityKind::Character => staged.stage_character(name),
            EntityKind::Location => staged.stage_location(name),
            _ => {
                return Err(ResolveError::Unknown {
                    reference: name.to_string(),
                    kind: kind.name(),
                });
            }
        }
        .map_err(|_| ResolveError::EmptyReference)?;

        info!(reference = name, kind = kind.name(), id = %staged_id, "Staged new entity");
        Ok(Resolution {
            id: staged_id,
            outcome: MatchOutcome::Staged,
        })
    }

    /// Resolve and return only the id.
    pub fn resolve_id(
        &self,
        reference: &str,
        kind: EntityKind,
        universe: &Universe,
        staged: &mut StagedEntities,
    ) -> Result<EntityId, ResolveError> {
        self.resolve(reference, kind, universe, staged).map(|r| r.id)
    }

    /// Match without staging. `Ok(None)` means a new entity would be created.
    pub fn lookup(
        &self,
        reference: &str,
        kind: EntityKind,
        universe: &Universe,
        staged: &StagedEntities,
    ) -> Result<Option<Resolution>, ResolveError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ResolveError::EmptyReference);
        }

        // 1. Exact id
        let as_id = EntityId::from(reference);
        if as_id.is_provisional() || as_id.kind().is_some() {
            let known = if as_id.is_provisional() {
                staged.contains_kind(kind, &as_id)
            } else if as_id.is_kind(kind) {
                universe.contains(kind, &as_id)
            } else {
                return Err(ResolveError::KindMismatch {
                    reference: reference.to_string(),
                    expected: kind.name(),
                });
            };

            if !known {
                return Err(ResolveError::Unknown {
                    reference: reference.to_string(),
                    kind: kind.name(),
                });
            }
            debug!(reference, "Resolved by id");
            return Ok(Some(Resolution {
                id: as_id,
                outcome: MatchOutcome::ExactId,
            }));
        }

        let candidates = candidates(kind, universe, staged);
        if candidates.is_empty() && !matches!(kind, EntityKind::Character | EntityKind::Location) {
            return Err(ResolveError::Unknown {
                reference: reference.to_string(),
                kind: kind.name(),
            });
        }

        // 2. Exact name (universe candidates come first)
        if let Some((id, _)) = candidates
            .iter()
            .find(|(_, name)| names_match(name, reference))
        {
            debug!(reference, id = %id, "Resolved by exact name");
            return Ok(Some(Resolution {
                id: (*id).clone(),
                outcome: MatchOutcome::ExactName,
            }));
        }

        // 3. Fuzzy, only if unambiguous
        let mut scored: Vec<(f32, &EntityId)> = candidates
            .iter()
            .map(|(id, name)| (name_similarity(reference, name), *id))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        if let Some(&(best, id)) = scored.first() {
            let runner_up = scored.get(1).map(|(s, _)| *s).unwrap_or(0.0);
            if best >= self.policy.threshold && best - runner_up >= self.policy.margin {
                debug!(reference, id = %id, score = best, "Resolved by fuzzy match");
                return Ok(Some(Resolution {
                    id: id.clone(),
                    outcome: MatchOutcome::Fuzzy { score: best },
                }));
            }
            if best >= self.policy.threshold {
                debug!(
                    reference,
                    best,
                    runner_up,
                    "Fuzzy match ambiguous, treating as new entity"
                );
            }
        }

        Ok(None)
    }
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}

/// `(id, name)` pairs for `kind`: live universe records, then staged ones.
fn candidates<'a>(
    kind: EntityKind,
    universe: &'a Universe,
    staged: &'a StagedEntities,
) -> Vec<(&'a EntityId, &'a str)> {
    let mut out: Vec<(&EntityId, &str)> = match kind {
        EntityKind::Character => universe
            .characters
            .values()
            .filter(|c| c.superseded_by.is_none())
            .map(|c| (&c.id, c.name.as_str()))
            .collect(),
        EntityKind::Location => universe
            .locations
            .values()
            .filter(|l| l.superseded_by.is_none())
            .map(|l| (&l.id, l.name.as_str()))
            .collect(),
        _ => Vec::new(),
    };
    out.extend(staged.names(kind));
    out
}

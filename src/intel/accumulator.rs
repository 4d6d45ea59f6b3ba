//! Intelligence accumulator: validate, dedupe and merge candidates.

use tracing::debug;

use super::entity::{EntityType, ExtractedEntity, Intelligence};
use super::validate::validate;

/// What one merge did to the intelligence set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Newly admitted `(type, normalized value)` pairs.
    pub added: Vec<(EntityType, String)>,
    /// Accepted by the validator but already known.
    pub duplicates: usize,
    /// Rejected by the validator or over the labeled-entry cap.
    pub rejected: usize,
}

impl MergeOutcome {
    /// Whether the set strictly grew.
    pub fn grew(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Merges deterministic and oracle-supplied entities into a session's set.
#[derive(Debug, Clone)]
pub struct IntelligenceAccumulator {
    max_other_labeled: usize,
}

impl IntelligenceAccumulator {
    pub fn new(max_other_labeled: usize) -> Self {
        Self { max_other_labeled }
    }

    /// Union the accepted candidates into `intelligence`.
    ///
    /// Idempotent: merging the same candidates again adds nothing.
    pub fn merge<I>(&self, intelligence: &mut Intelligence, candidates: I) -> MergeOutcome
    where
        I: IntoIterator<Item = ExtractedEntity>,
    {
        let mut outcome = MergeOutcome::default();

        for candidate in candidates {
            let entity = match validate(candidate) {
                Ok(entity) => entity,
                Err(rejection) => {
                    debug!(reason = %rejection, "Entity rejected by validator");
                    outcome.rejected += 1;
                    continue;
                }
            };
            let Some(normalized) = entity.normalized_value else {
                outcome.rejected += 1;
                continue;
            };

            if intelligence.contains(entity.entity_type, &normalized) {
                outcome.duplicates += 1;
                continue;
            }

            if entity.entity_type == EntityType::OtherLabeled
                && intelligence.count(EntityType::OtherLabeled) >= self.max_other_labeled
            {
                debug!(value = %normalized, "Labeled entry cap reached, dropping");
                outcome.rejected += 1;
                continue;
            }

            intelligence.insert(entity.entity_type, normalized.clone());
            outcome.added.push((entity.entity_type, normalized));
        }

        outcome
    }
}

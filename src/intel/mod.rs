//! Intelligence accumulation: extraction, validation and merge.
//!
//! Candidates arrive from two sources (the deterministic scan and the
//! engagement oracle's inline extraction), pass through the validator and
//! are unioned into the session's append-only set.

pub mod accumulator;
pub mod entity;
pub mod extract;
pub mod validate;

pub use accumulator::{IntelligenceAccumulator, MergeOutcome};
pub use entity::{EntityOrigin, EntityType, ExtractedEntity, Intelligence};
pub use extract::extract_entities;
pub use validate::{Rejection, validate};

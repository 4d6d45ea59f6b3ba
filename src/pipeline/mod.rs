//! Turn processing pipeline.
//!
//! Every scammer message flows through:
//! 1. `PatternMatcher::scan()`: fast pattern matching (no oracle)
//! 2. `DetectionEngine::assess()`: classification oracle when uncertain
//! 3. `EngagementPolicy::decide()`: observe, engage, or stop
//! 4. `TurnProcessor`: reply, intelligence merge, versioned write

pub mod processor;
pub mod report;
pub mod types;

pub use processor::TurnProcessor;
pub use report::{HttpReporter, IntelligenceReporter, NoopReporter, SessionReport};
pub use types::{HistoryMessage, Speaker, TurnDecision, TurnRequest};

//! Scam detection: deterministic patterns plus the classification oracle.

pub mod engine;
pub mod patterns;
pub mod types;

pub use engine::{Detection, DetectionEngine};
pub use patterns::PatternMatcher;
pub use types::{Indicator, IndicatorCategory, ScanResult, Signal, SignalSource, Verdict};

//! Scam Honeypot: stateful scam detection and engagement engine.

pub mod api;
pub mod config;
pub mod detection;
pub mod engagement;
pub mod error;
pub mod intel;
pub mod llm;
pub mod oracle;
pub mod pipeline;
pub mod session;

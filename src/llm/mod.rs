//! LLM integration.
//!
//! The oracles talk to a model through the `LlmProvider` trait; the only
//! shipped backend is Anthropic's Messages API over reqwest.

mod anthropic;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use provider::*;

//! LLM provider abstractions for metaloop.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `structured`: schema-constrained completions

pub mod box_provider;
pub mod provider;
pub mod structured;

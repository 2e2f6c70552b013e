//! Flywheel logic and port trait definitions for metaloop.
//!
//! This crate defines the "ports" (LLM provider, metrics source, outcome
//! store, filesystem) that the infrastructure layer implements, plus the
//! three coupled phases: generator, tracker, and learner. It depends only on
//! `metaloop-types` -- never on `metaloop-infra` or any IO crate.

pub mod audit;
pub mod cycle;
pub mod generator;
pub mod learner;
pub mod llm;
pub mod metrics;
pub mod service;
pub mod tracker;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

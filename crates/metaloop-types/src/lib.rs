//! Shared domain types for metaloop.
//!
//! This crate contains the data model of the description flywheel:
//! candidates, generation outcomes, tracked records and classifications,
//! learned patterns and prompt state, audit events, the batch artifact,
//! configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, schemars.

pub mod artifact;
pub mod audit;
pub mod candidate;
pub mod config;
pub mod error;
pub mod generation;
pub mod llm;
pub mod prompt;
pub mod tracking;

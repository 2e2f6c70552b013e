//! Infrastructure layer for metaloop.
//!
//! Contains implementations of the ports defined in `metaloop-core`:
//! the Anthropic Messages provider, a JSON-lines outcome store, a metrics
//! snapshot source, filesystem adapters for prompt state, and loaders for
//! the config file, candidate list, and batch artifact.

pub mod artifact;
pub mod config;
pub mod filesystem;
pub mod llm;
pub mod metrics;
pub mod outcome;

//! Observability setup for metaloop: structured logging with optional
//! OpenTelemetry span export.

pub mod tracing_setup;

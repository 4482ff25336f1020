//! Stratix BFF core library: request normalization, downstream client,
//! enrichment, configuration and the HTTP gateway used by the CLI.

pub mod config;
pub mod diagnostics;
pub mod downstream;
pub mod enrich;
pub mod gateway;
pub mod normalize;
pub mod secrets;

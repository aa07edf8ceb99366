//! notiflow-core: Shared types, configuration, and the ingest boundary.
//! Turns raw notification-source records into validated [`types::Entry`]
//! values that the engine can trust.

pub mod config;
pub mod ingest;
pub mod types;

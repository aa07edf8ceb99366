//! notiflow-engine: Notification registry, timers, and snapshot publishing.
//! The [`engine::Engine`] owns all state; callers serialize every mutation
//! through it and supply the monotonic clock explicitly.

pub mod engine;
pub mod publisher;
pub mod registry;
pub mod source;
pub mod timers;

pub use notiflow_core::types;

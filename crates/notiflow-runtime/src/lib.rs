//! notiflow-runtime: tokio driver and stdio bridge for the notification engine.
//! The binary in `main.rs` wires these together.

pub mod bridge;
pub mod cli;
pub mod driver;

//! Core bootstrap: configuration, shared state, error bridging, and
//! background task management.

pub mod config;
pub mod error;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::AppState;
pub use tasks::{BackgroundTasks, TaskKind};

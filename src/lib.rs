//! Keeps a per-user table of Evolution API WhatsApp instances in step with the
//! gateway, and resolves a user's role inside gateway groups.

pub mod config;
pub mod db;
pub mod evolution;
pub mod groups;
pub mod model;
pub mod scheduler;
pub mod sync;

/// Shared `tracing` setup for every binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

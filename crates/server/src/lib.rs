//! HTTP server for the Perch update server.
//!
//! This crate provides:
//! - The update protocol (`/update`, `/latest.yml`, `/download`)
//! - Multipart release uploads with staged commits
//! - Rollback to historical releases
//! - Admin endpoints for versions, files, logs and settings
//! - Prometheus metrics and configuration loading

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

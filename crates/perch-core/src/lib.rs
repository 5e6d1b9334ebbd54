//! Perch Core Library
//!
//! Shared functionality for Perch components:
//! - Configuration resolution and hierarchy
//! - Free-tier admission policy (node capacity + user quotas)
//! - SQLite pool helpers shared by storage layers
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod policy;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use policy::{Admission, DenyReason, NodePolicy};

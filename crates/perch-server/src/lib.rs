//! Perch dashboard server.
//!
//! Free-tier game-server dashboard in front of a Pterodactyl-compatible
//! panel: local accounts and tickets in SQLite, server inventory and
//! lifecycle delegated to the panel, admission gated by the capacity
//! policy in perch-core.

pub mod auth;
pub mod captcha;
pub mod console;
pub mod http;
pub mod provision;
pub mod settings;
pub mod storage;

pub use http::{AppState, build_router};

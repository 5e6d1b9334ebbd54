//! REST API handlers.

pub mod account;
pub mod admin;
pub mod auth;
pub mod servers;
pub mod settings;
pub mod tickets;

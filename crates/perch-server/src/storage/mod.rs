//! SQLite storage for the perch dashboard server.
//!
//! Persists local users, the settings singleton, and support tickets.
//! Game servers are never persisted here; the panel owns them.

mod db;
mod models;
mod queries;
mod queries_tickets;

#[cfg(test)]
mod tests;

pub use db::Database;
pub use models::*;

pub use perch_core::db::DatabaseError;

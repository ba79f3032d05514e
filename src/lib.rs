//! ChangeFlow - staged change workflow for fleet configuration
//!
//! Configuration entities are never mutated directly. A mutation is recorded
//! as a pending change, promoted by an approving user, and can later be
//! reverted or canceled.

pub mod auth;
pub mod change;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

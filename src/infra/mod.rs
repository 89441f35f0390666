//! Infrastructure adapters and runtime bootstrap.

pub mod auth;
pub mod db;
pub mod error;
pub mod memory;
pub mod telemetry;
pub mod timed;

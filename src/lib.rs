//! Catalog backend for categories, products and users: paginated filtering
//! over a document store with a read-through cache in front of it.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

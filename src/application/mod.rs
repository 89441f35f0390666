pub mod auth;
pub mod catalog;
pub mod categories;
pub mod context;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod pagination;
pub mod products;
pub mod repos;
pub mod users;

pub mod document;
pub mod entities;
pub mod error;
pub mod payload;
pub mod types;

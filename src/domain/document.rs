//! Storage-neutral document shape shared by every collection.
//!
//! Identity and timestamps live beside the body so both backends can index
//! and order on them; every other field is kept in a JSON object keyed by its
//! canonical camelCase name.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{error::DomainError, types::Collection};

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub body: Map<String, Value>,
}

impl Document {
    /// Restrict the body to the listed keys, preserving only fields present.
    pub fn project(mut self, fields: &[&str]) -> Self {
        if fields.is_empty() {
            return self;
        }
        self.body.retain(|key, _| fields.contains(&key.as_str()));
        self
    }
}

/// A record that round-trips through a [`Document`].
pub trait StoredRecord: Sized {
    const COLLECTION: Collection;
    const ENTITY: &'static str;

    fn to_document(&self) -> Result<Document, DomainError>;

    fn from_document(document: Document) -> Result<Self, DomainError>;
}

pub(crate) fn encode_body<B: Serialize>(
    entity: &'static str,
    body: &B,
) -> Result<Map<String, Value>, DomainError> {
    match serde_json::to_value(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DomainError::malformed(
            entity,
            format!("expected an object body, got {other}"),
        )),
        Err(err) => Err(DomainError::malformed(entity, err.to_string())),
    }
}

pub(crate) fn decode_body<B: DeserializeOwned>(
    entity: &'static str,
    body: Map<String, Value>,
) -> Result<B, DomainError> {
    serde_json::from_value(Value::Object(body))
        .map_err(|err| DomainError::malformed(entity, err.to_string()))
}

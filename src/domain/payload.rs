//! Public response shapes and the projection from stored records.
//!
//! A payload type lists exactly the fields a caller may see. Secrets such as
//! the password hash and the stored refresh-token hash have no slot in any
//! payload, so no projection can leak them.

use std::fmt::Debug;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::domain::{
    document::{CREATED_AT_FIELD, Document, ID_FIELD, StoredRecord},
    entities::{CategoryRecord, ProductRecord, UserRecord, default_available},
    error::DomainError,
    types::Role,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPayload {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: i64,
    pub category_id: Uuid,
    #[serde(default = "default_available")]
    pub available: bool,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Per-resource mapping from a stored record to its public payload.
pub trait Projection: StoredRecord {
    type Payload: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync;

    /// Body keys the payload is built from; used as the storage projection
    /// so list queries never fetch secret fields.
    const PAYLOAD_FIELDS: &'static [&'static str];

    fn project(&self) -> Self::Payload;
}

impl Projection for CategoryRecord {
    type Payload = CategoryPayload;
    const PAYLOAD_FIELDS: &'static [&'static str] = &["name", "description"];

    fn project(&self) -> CategoryPayload {
        CategoryPayload {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
        }
    }
}

impl Projection for ProductRecord {
    type Payload = ProductPayload;
    const PAYLOAD_FIELDS: &'static [&'static str] = &[
        "name",
        "sku",
        "price",
        "stockQuantity",
        "categoryId",
        "available",
        "description",
    ];

    fn project(&self) -> ProductPayload {
        ProductPayload {
            id: self.id,
            name: self.name.clone(),
            sku: self.sku.clone(),
            price: self.price,
            stock_quantity: self.stock_quantity,
            category_id: self.category_id,
            available: self.available,
            description: self.description.clone(),
            created_at: self.created_at,
        }
    }
}

impl Projection for UserRecord {
    type Payload = UserPayload;
    const PAYLOAD_FIELDS: &'static [&'static str] = &["email", "role"];

    fn project(&self) -> UserPayload {
        UserPayload {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Build a payload straight from a document fetched with
/// [`Projection::PAYLOAD_FIELDS`] as its projection.
pub fn payload_from_document<R: Projection>(document: Document) -> Result<R::Payload, DomainError> {
    let created_at = document
        .created_at
        .format(&Rfc3339)
        .map_err(|err| DomainError::malformed(R::ENTITY, err.to_string()))?;

    let mut fields = document.body;
    fields.retain(|key, _| R::PAYLOAD_FIELDS.contains(&key.as_str()));
    fields.insert(ID_FIELD.to_string(), Value::String(document.id.to_string()));
    fields.insert(CREATED_AT_FIELD.to_string(), Value::String(created_at));

    serde_json::from_value(Value::Object(fields))
        .map_err(|err| DomainError::malformed(R::ENTITY, err.to_string()))
}

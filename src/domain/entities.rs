//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    document::{Document, StoredRecord, decode_body, encode_body},
    error::DomainError,
    types::{Collection, Role},
};

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock_quantity: i64,
    pub category_id: Uuid,
    pub available: bool,
    pub sku: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ProductRecord {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DomainError::validation(
                "price must be a non-negative number",
            ));
        }
        if self.stock_quantity < 0 {
            return Err(DomainError::validation(
                "stockQuantity must not be negative",
            ));
        }
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub refresh_token_hash: Option<String>,
    pub role: Role,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    price: f64,
    #[serde(default)]
    stock_quantity: i64,
    category_id: Uuid,
    #[serde(default = "default_available")]
    available: bool,
    sku: String,
}

pub(crate) fn default_available() -> bool {
    true
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserBody {
    email: String,
    password: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    role: Role,
}

impl StoredRecord for CategoryRecord {
    const COLLECTION: Collection = Collection::Categories;
    const ENTITY: &'static str = "category";

    fn to_document(&self) -> Result<Document, DomainError> {
        let body = CategoryBody {
            name: self.name.clone(),
            description: self.description.clone(),
        };
        Ok(Document {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            body: encode_body(Self::ENTITY, &body)?,
        })
    }

    fn from_document(document: Document) -> Result<Self, DomainError> {
        let body: CategoryBody = decode_body(Self::ENTITY, document.body)?;
        Ok(Self {
            id: document.id,
            name: body.name,
            description: body.description,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

impl StoredRecord for ProductRecord {
    const COLLECTION: Collection = Collection::Products;
    const ENTITY: &'static str = "product";

    fn to_document(&self) -> Result<Document, DomainError> {
        let body = ProductBody {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            stock_quantity: self.stock_quantity,
            category_id: self.category_id,
            available: self.available,
            sku: self.sku.clone(),
        };
        Ok(Document {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            body: encode_body(Self::ENTITY, &body)?,
        })
    }

    fn from_document(document: Document) -> Result<Self, DomainError> {
        let body: ProductBody = decode_body(Self::ENTITY, document.body)?;
        Ok(Self {
            id: document.id,
            name: body.name,
            description: body.description,
            price: body.price,
            stock_quantity: body.stock_quantity,
            category_id: body.category_id,
            available: body.available,
            sku: body.sku,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

impl StoredRecord for UserRecord {
    const COLLECTION: Collection = Collection::Users;
    const ENTITY: &'static str = "user";

    fn to_document(&self) -> Result<Document, DomainError> {
        let body = UserBody {
            email: self.email.clone(),
            password: self.password_hash.clone(),
            refresh_token: self.refresh_token_hash.clone(),
            role: self.role,
        };
        Ok(Document {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            body: encode_body(Self::ENTITY, &body)?,
        })
    }

    fn from_document(document: Document) -> Result<Self, DomainError> {
        let body: UserBody = decode_body(Self::ENTITY, document.body)?;
        Ok(Self {
            id: document.id,
            email: body.email,
            password_hash: body.password,
            refresh_token_hash: body.refresh_token,
            role: body.role,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

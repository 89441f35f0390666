use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        categories::{CATEGORY_NOT_FOUND, INVALID_CATEGORY_ID},
        context::{ServiceContext, conflict_on_duplicate, parse_id},
        error::AppError,
        filter::{PRODUCT_FIELDS, QueryPredicate},
        pagination::{Page, PageRequest},
    },
    domain::{
        document::StoredRecord,
        entities::{CategoryRecord, ProductRecord},
        payload::{ProductPayload, Projection},
    },
};

pub const PRODUCT_NOT_FOUND: &str = "Product not found";
pub const PRODUCT_SKU_EXISTS: &str = "Product with this SKU already exists";
pub const INVALID_PRODUCT_ID: &str = "Invalid product ID";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductCommand {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock_quantity: Option<i64>,
    pub category_id: String,
    pub available: Option<bool>,
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductCommand {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub category_id: Option<String>,
    pub available: Option<bool>,
    pub sku: Option<String>,
}

#[derive(Clone)]
pub struct ProductService {
    ctx: ServiceContext,
}

impl ProductService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, command: CreateProductCommand) -> Result<ProductPayload, AppError> {
        let name = required_text(&command.name, "Product name is required")?;
        let category_id = parse_id(&command.category_id, INVALID_CATEGORY_ID)?;
        self.ensure_category(category_id).await?;

        let sku = match command.sku.as_deref().map(str::trim) {
            Some(sku) if !sku.is_empty() => sku.to_string(),
            _ => generate_sku(),
        };
        self.ensure_sku_free(&sku, None).await?;

        let now = OffsetDateTime::now_utc();
        let record = ProductRecord {
            id: Uuid::new_v4(),
            name,
            description: command.description,
            price: command.price,
            stock_quantity: command.stock_quantity.unwrap_or(0),
            category_id,
            available: command.available.unwrap_or(true),
            sku,
            created_at: now,
            updated_at: now,
        };
        record.validate()?;

        self.ctx
            .store()
            .insert(ProductRecord::COLLECTION, &record.to_document()?)
            .await
            .map_err(|err| conflict_on_duplicate(err, PRODUCT_SKU_EXISTS))?;

        info!(product_id = %record.id, sku = %record.sku, "product created");
        Ok(record.project())
    }

    pub async fn list(&self, request: &PageRequest) -> Result<Page<ProductPayload>, AppError> {
        self.ctx
            .cached_page::<ProductRecord>(request, &PRODUCT_FIELDS)
            .await
    }

    pub async fn get(&self, raw_id: &str) -> Result<ProductPayload, AppError> {
        let id = parse_id(raw_id, INVALID_PRODUCT_ID)?;
        self.ctx
            .cached_payload::<ProductRecord>(id, PRODUCT_NOT_FOUND)
            .await
    }

    pub async fn update(
        &self,
        raw_id: &str,
        command: UpdateProductCommand,
    ) -> Result<ProductPayload, AppError> {
        let id = parse_id(raw_id, INVALID_PRODUCT_ID)?;

        // A bad category is reported before the product lookup.
        let category_id = match command.category_id.as_deref() {
            Some(raw) => {
                let category_id = parse_id(raw, INVALID_CATEGORY_ID)?;
                self.ensure_category(category_id).await?;
                Some(category_id)
            }
            None => None,
        };

        let mut record = self
            .ctx
            .load::<ProductRecord>(id)
            .await?
            .ok_or_else(|| AppError::not_found(PRODUCT_NOT_FOUND))?;

        if let Some(name) = command.name {
            record.name = required_text(&name, "Product name is required")?;
        }
        if let Some(sku) = command.sku {
            let sku = required_text(&sku, "sku must not be empty")?;
            if sku != record.sku {
                self.ensure_sku_free(&sku, Some(id)).await?;
            }
            record.sku = sku;
        }
        if let Some(description) = command.description {
            record.description = Some(description);
        }
        if let Some(price) = command.price {
            record.price = price;
        }
        if let Some(stock_quantity) = command.stock_quantity {
            record.stock_quantity = stock_quantity;
        }
        if let Some(available) = command.available {
            record.available = available;
        }
        if let Some(category_id) = category_id {
            record.category_id = category_id;
        }
        record.updated_at = OffsetDateTime::now_utc();
        record.validate()?;

        let updated = self
            .ctx
            .store()
            .update_by_id(ProductRecord::COLLECTION, &record.to_document()?)
            .await
            .map_err(|err| conflict_on_duplicate(err, PRODUCT_SKU_EXISTS))?;
        if !updated {
            return Err(AppError::not_found(PRODUCT_NOT_FOUND));
        }

        self.ctx.evict::<ProductRecord>(id).await;
        info!(product_id = %id, "product updated");
        Ok(record.project())
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), AppError> {
        let id = parse_id(raw_id, INVALID_PRODUCT_ID)?;
        let deleted = self
            .ctx
            .store()
            .delete_by_id(ProductRecord::COLLECTION, id)
            .await?;
        if !deleted {
            return Err(AppError::not_found(PRODUCT_NOT_FOUND));
        }

        self.ctx.evict::<ProductRecord>(id).await;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    async fn ensure_category(&self, category_id: Uuid) -> Result<(), AppError> {
        let found = self
            .ctx
            .store()
            .find_by_id(CategoryRecord::COLLECTION, category_id)
            .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(AppError::not_found(CATEGORY_NOT_FOUND)),
        }
    }

    async fn ensure_sku_free(&self, sku: &str, except: Option<Uuid>) -> Result<(), AppError> {
        let mut predicate = QueryPredicate::text_equals("sku", sku);
        if let Some(id) = except {
            predicate = predicate.excluding_id(id);
        }
        match self
            .ctx
            .store()
            .find_one(ProductRecord::COLLECTION, &predicate)
            .await?
        {
            Some(_) => Err(AppError::conflict(PRODUCT_SKU_EXISTS)),
            None => Ok(()),
        }
    }
}

fn required_text(raw: &str, message: &'static str) -> Result<String, AppError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(value.to_string())
}

/// `SKU-` followed by eight upper-case hex digits.
fn generate_sku() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("SKU-{}", simple[..8].to_ascii_uppercase())
}

//! Resource dispatch by collection, producing response envelopes.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::{
    application::{
        auth::CredentialHasher,
        categories::CategoryService,
        context::ServiceContext,
        envelope::Envelope,
        error::AppError,
        pagination::PageRequest,
        products::ProductService,
        users::UserService,
    },
    domain::types::Collection,
};

#[derive(Clone)]
pub struct Catalog {
    pub categories: CategoryService,
    pub products: ProductService,
    pub users: UserService,
}

impl Catalog {
    pub fn new(ctx: ServiceContext, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            categories: CategoryService::new(ctx.clone()),
            products: ProductService::new(ctx.clone()),
            users: UserService::new(ctx, hasher),
        }
    }

    pub async fn list(
        &self,
        collection: Collection,
        request: &PageRequest,
    ) -> Result<Envelope<Value>, AppError> {
        match collection {
            Collection::Categories => success(
                "Categories fetched successfully",
                self.categories.list(request).await?,
            ),
            Collection::Products => success(
                "Products fetched successfully",
                self.products.list(request).await?,
            ),
            Collection::Users => success(
                "Users fetched successfully",
                self.users.list(request).await?,
            ),
        }
    }

    pub async fn get(&self, collection: Collection, raw_id: &str) -> Result<Envelope<Value>, AppError> {
        match collection {
            Collection::Categories => success(
                "Category fetched successfully",
                self.categories.get(raw_id).await?,
            ),
            Collection::Products => success(
                "Product fetched successfully",
                self.products.get(raw_id).await?,
            ),
            Collection::Users => {
                success("User fetched successfully", self.users.get(raw_id).await?)
            }
        }
    }
}

fn success<T: Serialize>(message: &str, data: T) -> Result<Envelope<Value>, AppError> {
    let data = serde_json::to_value(data)
        .map_err(|err| AppError::unexpected(format!("failed to encode payload: {err}")))?;
    Ok(Envelope::success(message, data))
}

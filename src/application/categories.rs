use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        context::{ServiceContext, conflict_on_duplicate, parse_id},
        error::AppError,
        filter::{CATEGORY_FIELDS, QueryPredicate},
        pagination::{Page, PageRequest},
    },
    domain::{
        document::StoredRecord,
        entities::CategoryRecord,
        payload::{CategoryPayload, Projection},
    },
};

pub const CATEGORY_EXISTS: &str = "Category already exists";
pub const CATEGORY_NOT_FOUND: &str = "Category not found";
pub const INVALID_CATEGORY_ID: &str = "Invalid category ID";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryCommand {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryCommand {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct CategoryService {
    ctx: ServiceContext,
}

impl CategoryService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, command: CreateCategoryCommand) -> Result<CategoryPayload, AppError> {
        let name = required_name(&command.name)?;
        self.ensure_name_free(&name, None).await?;

        let now = OffsetDateTime::now_utc();
        let record = CategoryRecord {
            id: Uuid::new_v4(),
            name,
            description: command.description,
            created_at: now,
            updated_at: now,
        };
        self.ctx
            .store()
            .insert(CategoryRecord::COLLECTION, &record.to_document()?)
            .await
            .map_err(|err| conflict_on_duplicate(err, CATEGORY_EXISTS))?;

        info!(category_id = %record.id, name = %record.name, "category created");
        Ok(record.project())
    }

    pub async fn list(&self, request: &PageRequest) -> Result<Page<CategoryPayload>, AppError> {
        self.ctx
            .cached_page::<CategoryRecord>(request, &CATEGORY_FIELDS)
            .await
    }

    pub async fn get(&self, raw_id: &str) -> Result<CategoryPayload, AppError> {
        let id = parse_id(raw_id, INVALID_CATEGORY_ID)?;
        self.ctx
            .cached_payload::<CategoryRecord>(id, CATEGORY_NOT_FOUND)
            .await
    }

    pub async fn update(
        &self,
        raw_id: &str,
        command: UpdateCategoryCommand,
    ) -> Result<CategoryPayload, AppError> {
        let id = parse_id(raw_id, INVALID_CATEGORY_ID)?;
        let mut record = self
            .ctx
            .load::<CategoryRecord>(id)
            .await?
            .ok_or_else(|| AppError::not_found(CATEGORY_NOT_FOUND))?;

        if let Some(name) = command.name {
            let name = required_name(&name)?;
            if name != record.name {
                self.ensure_name_free(&name, Some(id)).await?;
            }
            record.name = name;
        }
        if let Some(description) = command.description {
            record.description = Some(description);
        }
        record.updated_at = OffsetDateTime::now_utc();

        let updated = self
            .ctx
            .store()
            .update_by_id(CategoryRecord::COLLECTION, &record.to_document()?)
            .await
            .map_err(|err| conflict_on_duplicate(err, CATEGORY_EXISTS))?;
        if !updated {
            return Err(AppError::not_found(CATEGORY_NOT_FOUND));
        }

        self.ctx.evict::<CategoryRecord>(id).await;
        info!(category_id = %id, "category updated");
        Ok(record.project())
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), AppError> {
        let id = parse_id(raw_id, INVALID_CATEGORY_ID)?;
        let deleted = self
            .ctx
            .store()
            .delete_by_id(CategoryRecord::COLLECTION, id)
            .await?;
        if !deleted {
            return Err(AppError::not_found(CATEGORY_NOT_FOUND));
        }

        self.ctx.evict::<CategoryRecord>(id).await;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), AppError> {
        let mut predicate = QueryPredicate::text_equals("name", name);
        if let Some(id) = except {
            predicate = predicate.excluding_id(id);
        }
        match self
            .ctx
            .store()
            .find_one(CategoryRecord::COLLECTION, &predicate)
            .await?
        {
            Some(_) => Err(AppError::conflict(CATEGORY_EXISTS)),
            None => Ok(()),
        }
    }
}

fn required_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("Category name is required"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroU32, sync::Arc};

    use super::*;
    use crate::{cache::ReadThrough, infra::memory::InMemoryDocumentStore};

    fn service() -> CategoryService {
        let ctx = ServiceContext::new(
            Arc::new(InMemoryDocumentStore::new()),
            ReadThrough::disabled(),
            NonZeroU32::new(10).expect("non-zero"),
            true,
        );
        CategoryService::new(ctx)
    }

    fn command(name: &str) -> CreateCategoryCommand {
        CreateCategoryCommand {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let service = service();
        service.create(command("Tea")).await.expect("first");
        let err = service.create(command(" Tea ")).await.expect_err("duplicate");
        assert!(matches!(err, AppError::Conflict(message) if message == CATEGORY_EXISTS));
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let err = service().create(command("   ")).await.expect_err("blank");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn get_reports_invalid_and_missing_ids() {
        let service = service();
        let err = service.get("42").await.expect_err("invalid");
        assert!(matches!(err, AppError::Validation(message) if message == INVALID_CATEGORY_ID));

        let err = service
            .get(&Uuid::new_v4().to_string())
            .await
            .expect_err("missing");
        assert!(matches!(err, AppError::NotFound(message) if message == CATEGORY_NOT_FOUND));
    }

    #[tokio::test]
    async fn update_keeps_unchanged_fields_and_allows_same_name() {
        let service = service();
        let created = service
            .create(CreateCategoryCommand {
                name: "Coffee".into(),
                description: Some("Beans".into()),
            })
            .await
            .expect("create");

        let updated = service
            .update(
                &created.id.to_string(),
                UpdateCategoryCommand {
                    name: Some("Coffee".into()),
                    description: None,
                },
            )
            .await
            .expect("update");

        assert_eq!(updated.name, "Coffee");
        assert_eq!(updated.description.as_deref(), Some("Beans"));
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let service = service();
        let created = service.create(command("Cocoa")).await.expect("create");
        let id = created.id.to_string();
        service.delete(&id).await.expect("delete");
        let err = service.delete(&id).await.expect_err("already gone");
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

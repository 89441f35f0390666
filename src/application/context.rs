//! Collaborators shared by the resource services, plus the cached read
//! paths every resource uses the same way.

use std::{num::NonZeroU32, sync::Arc};

use tracing::debug;
use uuid::Uuid;

use crate::{
    application::{
        error::AppError,
        filter::{self, FieldCatalog},
        pagination::{Page, PageRequest, PaginationExecutor},
        repos::{DocumentStore, RepoError},
    },
    cache::{ReadThrough, Selector, key_for},
    domain::{
        document::StoredRecord,
        payload::{Projection, payload_from_document},
    },
};

#[derive(Clone)]
pub struct ServiceContext {
    store: Arc<dyn DocumentStore>,
    cache: ReadThrough,
    pagination: PaginationExecutor,
    invalidate_on_write: bool,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: ReadThrough,
        default_limit: NonZeroU32,
        invalidate_on_write: bool,
    ) -> Self {
        Self {
            pagination: PaginationExecutor::new(store.clone(), default_limit),
            store,
            cache,
            invalidate_on_write,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn cache(&self) -> &ReadThrough {
        &self.cache
    }

    pub fn default_limit(&self) -> NonZeroU32 {
        self.pagination.default_limit()
    }

    /// Fetch and decode one record, bypassing the cache.
    pub(crate) async fn load<R: StoredRecord>(&self, id: Uuid) -> Result<Option<R>, AppError> {
        match self.store.find_by_id(R::COLLECTION, id).await? {
            Some(document) => Ok(Some(R::from_document(document)?)),
            None => Ok(None),
        }
    }

    /// One page of payloads straight from storage. Secret body fields are
    /// never selected because the projection is the payload's field list.
    pub(crate) async fn page<R: Projection>(
        &self,
        request: &PageRequest,
        catalog: &FieldCatalog,
    ) -> Result<Page<R::Payload>, AppError> {
        let predicate = filter::build(request, catalog)?;
        let sort = filter::build_sort(request, catalog)?;
        let page = self
            .pagination
            .execute(R::COLLECTION, request, &predicate, sort, R::PAYLOAD_FIELDS)
            .await?;
        Ok(page.try_map(payload_from_document::<R>)?)
    }

    /// [`Self::page`] through the read-through cache, keyed by the
    /// normalized request.
    pub(crate) async fn cached_page<R: Projection>(
        &self,
        request: &PageRequest,
        catalog: &FieldCatalog,
    ) -> Result<Page<R::Payload>, AppError> {
        // Bad filters are rejected here, before a key is derived for them.
        let normalized =
            filter::canonical_request(request, catalog)?.normalized(self.default_limit());
        self.cache
            .resolve(
                R::COLLECTION.as_str(),
                Selector::Page(&normalized),
                || self.page::<R>(&normalized, catalog),
            )
            .await
    }

    pub(crate) async fn cached_payload<R: Projection>(
        &self,
        id: Uuid,
        not_found: &'static str,
    ) -> Result<R::Payload, AppError> {
        let key = id.to_string();
        self.cache
            .resolve(R::COLLECTION.as_str(), Selector::Id(&key), || async {
                let record = self
                    .load::<R>(id)
                    .await?
                    .ok_or_else(|| AppError::not_found(not_found))?;
                Ok::<_, AppError>(record.project())
            })
            .await
    }

    /// Drop the by-id entry after a successful write.
    pub(crate) async fn evict<R: StoredRecord>(&self, id: Uuid) {
        if !self.invalidate_on_write {
            return;
        }
        if let Ok(key) = key_for(R::COLLECTION.as_str(), Selector::Id(&id.to_string())) {
            debug!(key = %key, "invalidating cached entry");
            self.cache.invalidate(&key).await;
        }
    }
}

pub(crate) fn parse_id(raw: &str, message: &'static str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(message))
}

/// Map a unique violation to a caller-facing conflict, passing every other
/// storage failure through.
pub(crate) fn conflict_on_duplicate(err: RepoError, message: &'static str) -> AppError {
    match err {
        RepoError::Duplicate { .. } => AppError::conflict(message),
        other => AppError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_ids_are_validation_errors() {
        let err = parse_id("not-a-uuid", "Invalid category ID").expect_err("invalid");
        assert!(matches!(err, AppError::Validation(message) if message == "Invalid category ID"));
        assert!(parse_id(&Uuid::new_v4().to_string(), "Invalid category ID").is_ok());
    }

    #[test]
    fn duplicates_become_conflicts() {
        let err = conflict_on_duplicate(
            RepoError::Duplicate {
                constraint: "categories_name_key".into(),
            },
            "Category already exists",
        );
        assert!(matches!(err, AppError::Conflict(message) if message == "Category already exists"));

        let err = conflict_on_duplicate(RepoError::Timeout, "Category already exists");
        assert!(matches!(err, AppError::Storage(RepoError::Timeout)));
    }
}

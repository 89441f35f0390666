use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    application::filter::{QueryPredicate, SortSpec},
    domain::{document::Document, types::Collection},
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FindOptions<'a> {
    pub sort: SortSpec,
    pub skip: u64,
    pub limit: u64,
    /// Body keys to return; empty returns the whole body.
    pub projection: &'a [&'a str],
}

impl Default for FindOptions<'_> {
    fn default() -> Self {
        Self {
            sort: SortSpec::default(),
            skip: 0,
            limit: u64::MAX,
            projection: &[],
        }
    }
}

/// Storage collaborator shared by every resource.
///
/// Implementations enforce the unique fields listed by
/// [`Collection::unique_fields`] and report violations as
/// [`RepoError::Duplicate`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn count(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
    ) -> Result<u64, RepoError>;

    async fn find(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
        options: &FindOptions<'_>,
    ) -> Result<Vec<Document>, RepoError>;

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepoError>;

    async fn insert(&self, collection: Collection, document: &Document) -> Result<(), RepoError>;

    /// Replace the body of an existing document; `false` when absent.
    async fn update_by_id(
        &self,
        collection: Collection,
        document: &Document,
    ) -> Result<bool, RepoError>;

    /// `false` when no document had this id.
    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> Result<bool, RepoError>;

    async fn ping(&self) -> Result<(), RepoError>;

    async fn find_one(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
    ) -> Result<Option<Document>, RepoError> {
        let options = FindOptions {
            limit: 1,
            ..FindOptions::default()
        };
        Ok(self
            .find(collection, predicate, &options)
            .await?
            .into_iter()
            .next())
    }
}

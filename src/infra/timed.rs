//! Deadline enforcement around any [`DocumentStore`].

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use metrics::counter;
use tracing::warn;
use uuid::Uuid;

use crate::{
    application::{
        filter::QueryPredicate,
        repos::{DocumentStore, FindOptions, RepoError},
    },
    domain::{document::Document, types::Collection},
};

pub const METRIC_STORAGE_TIMEOUT: &str = "storefront_storage_timeout_total";

/// Fails a storage call with [`RepoError::Timeout`] once `timeout` elapses.
#[derive(Clone)]
pub struct TimedDocumentStore {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl TimedDocumentStore {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, RepoError>>,
    ) -> Result<T, RepoError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                counter!(METRIC_STORAGE_TIMEOUT, "op" => op).increment(1);
                warn!(
                    op,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "storage call timed out"
                );
                Err(RepoError::Timeout)
            }
        }
    }
}

#[async_trait]
impl DocumentStore for TimedDocumentStore {
    async fn count(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
    ) -> Result<u64, RepoError> {
        self.bounded("count", self.inner.count(collection, predicate))
            .await
    }

    async fn find(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
        options: &FindOptions<'_>,
    ) -> Result<Vec<Document>, RepoError> {
        self.bounded("find", self.inner.find(collection, predicate, options))
            .await
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepoError> {
        self.bounded("find_by_id", self.inner.find_by_id(collection, id))
            .await
    }

    async fn insert(&self, collection: Collection, document: &Document) -> Result<(), RepoError> {
        self.bounded("insert", self.inner.insert(collection, document))
            .await
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        document: &Document,
    ) -> Result<bool, RepoError> {
        self.bounded("update", self.inner.update_by_id(collection, document))
            .await
    }

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> Result<bool, RepoError> {
        self.bounded("delete", self.inner.delete_by_id(collection, id))
            .await
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.bounded("ping", self.inner.ping()).await
    }
}

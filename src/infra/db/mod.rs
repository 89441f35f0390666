//! Postgres-backed document store.

mod predicate;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{
    FromRow, Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
    types::Json,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        filter::QueryPredicate,
        repos::{DocumentStore, FindOptions, RepoError},
    },
    domain::{document::Document, types::Collection},
};

use self::{
    predicate::{push_order_by, push_where},
    util::convert_count,
};

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    body: Json<Map<String, Value>>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            body: row.body.0,
        }
    }
}

#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    fn push_body_projection(qb: &mut QueryBuilder<'_, Postgres>, projection: &[&str]) {
        if projection.is_empty() {
            qb.push("body");
            return;
        }
        qb.push(
            "(SELECT coalesce(jsonb_object_agg(key, value), '{}'::jsonb) \
             FROM jsonb_each(body) WHERE key = ANY(",
        );
        qb.push_bind(
            projection
                .iter()
                .map(|field| field.to_string())
                .collect::<Vec<_>>(),
        );
        qb.push(")) AS body");
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn count(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
    ) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents");
        push_where(&mut qb, collection, predicate);

        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        convert_count(total)
    }

    async fn find(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
        options: &FindOptions<'_>,
    ) -> Result<Vec<Document>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id, created_at, updated_at, ");
        Self::push_body_projection(&mut qb, options.projection);
        qb.push(" FROM documents");
        push_where(&mut qb, collection, predicate);
        push_order_by(&mut qb, &options.sort);
        qb.push(" LIMIT ");
        qb.push_bind(i64::try_from(options.limit).unwrap_or(i64::MAX));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(options.skip).unwrap_or(i64::MAX));

        let rows: Vec<DocumentRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepoError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, created_at, updated_at, body FROM documents \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Document::from))
    }

    async fn insert(&self, collection: Collection, document: &Document) -> Result<(), RepoError> {
        query(
            "INSERT INTO documents (collection, id, created_at, updated_at, body) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(collection.as_str())
        .bind(document.id)
        .bind(document.created_at)
        .bind(document.updated_at)
        .bind(Json(&document.body))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        document: &Document,
    ) -> Result<bool, RepoError> {
        let result = query(
            "UPDATE documents SET body = $3, updated_at = $4 \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(document.id)
        .bind(Json(&document.body))
        .bind(document.updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> Result<bool, RepoError> {
        let result = query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_aggregates_requested_keys() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        PostgresDocumentStore::push_body_projection(&mut qb, &["email", "role"]);
        assert_eq!(
            qb.sql(),
            "SELECT (SELECT coalesce(jsonb_object_agg(key, value), '{}'::jsonb) \
             FROM jsonb_each(body) WHERE key = ANY($1)) AS body"
        );
    }

    #[test]
    fn empty_projection_selects_whole_body() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        PostgresDocumentStore::push_body_projection(&mut qb, &[]);
        assert_eq!(qb.sql(), "SELECT body");
    }
}

//! In-process document store.
//!
//! Evaluates predicates the same way the Postgres backend translates them:
//! pattern operators are case-insensitive, equality on text is exact, and a
//! missing field never satisfies a comparison other than `ne`.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    application::{
        filter::{
            Condition, FieldKind, FilterOperator, FilterValue, QueryPredicate, SortOrder,
            SortSpec,
        },
        repos::{DocumentStore, FindOptions, RepoError},
    },
    domain::{
        document::{CREATED_AT_FIELD, Document, ID_FIELD, UPDATED_AT_FIELD},
        types::Collection,
    },
};

type Collections = HashMap<Collection, HashMap<Uuid, Document>>;

#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching<'a>(
        documents: Option<&'a HashMap<Uuid, Document>>,
        predicate: &'a QueryPredicate,
    ) -> impl Iterator<Item = &'a Document> + 'a {
        documents
            .into_iter()
            .flat_map(HashMap::values)
            .filter(move |document| {
                predicate
                    .conditions()
                    .iter()
                    .all(|condition| evaluate(condition, document))
            })
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn count(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
    ) -> Result<u64, RepoError> {
        let guard = self.collections.read().await;
        let count = Self::matching(guard.get(&collection), predicate).count();
        Ok(count as u64)
    }

    async fn find(
        &self,
        collection: Collection,
        predicate: &QueryPredicate,
        options: &FindOptions<'_>,
    ) -> Result<Vec<Document>, RepoError> {
        let guard = self.collections.read().await;
        let mut matches: Vec<&Document> =
            Self::matching(guard.get(&collection), predicate).collect();
        matches.sort_by(|left, right| compare_for_sort(left, right, &options.sort));

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(options.limit).unwrap_or(usize::MAX);
        Ok(matches
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| document.clone().project(options.projection))
            .collect())
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepoError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(&collection)
            .and_then(|documents| documents.get(&id))
            .cloned())
    }

    async fn insert(&self, collection: Collection, document: &Document) -> Result<(), RepoError> {
        let mut guard = self.collections.write().await;
        let documents = guard.entry(collection).or_default();
        if documents.contains_key(&document.id) {
            return Err(RepoError::Duplicate {
                constraint: "documents_pkey".to_string(),
            });
        }
        check_unique(collection, documents, document)?;
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        document: &Document,
    ) -> Result<bool, RepoError> {
        let mut guard = self.collections.write().await;
        let documents = guard.entry(collection).or_default();
        if !documents.contains_key(&document.id) {
            return Ok(false);
        }
        check_unique(collection, documents, document)?;
        if let Some(existing) = documents.get_mut(&document.id) {
            existing.body = document.body.clone();
            existing.updated_at = document.updated_at;
        }
        Ok(true)
    }

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> Result<bool, RepoError> {
        let mut guard = self.collections.write().await;
        Ok(guard
            .get_mut(&collection)
            .and_then(|documents| documents.remove(&id))
            .is_some())
    }

    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

fn check_unique(
    collection: Collection,
    documents: &HashMap<Uuid, Document>,
    candidate: &Document,
) -> Result<(), RepoError> {
    for field in collection.unique_fields() {
        let Some(value) = candidate.body.get(*field) else {
            continue;
        };
        let clash = documents
            .values()
            .any(|other| other.id != candidate.id && other.body.get(*field) == Some(value));
        if clash {
            return Err(RepoError::Duplicate {
                constraint: format!("{collection}_{field}_key"),
            });
        }
    }
    Ok(())
}

fn evaluate(condition: &Condition, document: &Document) -> bool {
    let operator = condition.operator;

    if operator.is_pattern() {
        let (Some(actual), FilterValue::Text(needle)) =
            (text_of(document, condition.field), &condition.value)
        else {
            return false;
        };
        let actual = actual.to_lowercase();
        let needle = needle.to_lowercase();
        return match operator {
            FilterOperator::Contains => actual.contains(&needle),
            FilterOperator::StartsWith => actual.starts_with(&needle),
            FilterOperator::EndsWith => actual.ends_with(&needle),
            _ => false,
        };
    }

    let ordering = compare_to_value(document, condition.field, &condition.value);
    match operator {
        FilterOperator::Eq => ordering == Some(Ordering::Equal),
        FilterOperator::Ne => ordering != Some(Ordering::Equal),
        FilterOperator::Gt => ordering == Some(Ordering::Greater),
        FilterOperator::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        FilterOperator::Lt => ordering == Some(Ordering::Less),
        FilterOperator::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => false,
    }
}

fn compare_to_value(document: &Document, field: &str, value: &FilterValue) -> Option<Ordering> {
    match value {
        FilterValue::Text(expected) => {
            text_of(document, field).map(|actual| actual.as_str().cmp(expected.as_str()))
        }
        FilterValue::Number(expected) => number_of(document, field)?.partial_cmp(expected),
        FilterValue::Bool(expected) => document
            .body
            .get(field)?
            .as_bool()
            .map(|actual| actual.cmp(expected)),
        FilterValue::Timestamp(expected) => {
            timestamp_of(document, field).map(|actual| actual.cmp(expected))
        }
        FilterValue::Id(expected) => id_of(document, field).map(|actual| actual.cmp(expected)),
    }
}

fn compare_for_sort(left: &Document, right: &Document, sort: &SortSpec) -> Ordering {
    let field = sort.field();
    let primary = match sort.kind {
        FieldKind::Timestamp => timestamp_of(left, field).cmp(&timestamp_of(right, field)),
        FieldKind::Number => match (number_of(left, field), number_of(right, field)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            (a, b) => a.is_some().cmp(&b.is_some()),
        },
        FieldKind::Bool => {
            let flag = |document: &Document| document.body.get(field).and_then(|v| v.as_bool());
            flag(left).cmp(&flag(right))
        }
        FieldKind::Id => id_of(left, field).cmp(&id_of(right, field)),
        FieldKind::Text => text_of(left, field).cmp(&text_of(right, field)),
    };
    let ordering = primary.then_with(|| left.id.cmp(&right.id));
    match sort.order() {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn text_of(document: &Document, field: &str) -> Option<String> {
    if field == ID_FIELD {
        return Some(document.id.to_string());
    }
    match document.body.get(field)? {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn number_of(document: &Document, field: &str) -> Option<f64> {
    document.body.get(field)?.as_f64()
}

fn timestamp_of(document: &Document, field: &str) -> Option<OffsetDateTime> {
    match field {
        CREATED_AT_FIELD => Some(document.created_at),
        UPDATED_AT_FIELD => Some(document.updated_at),
        _ => None,
    }
}

fn id_of(document: &Document, field: &str) -> Option<Uuid> {
    if field == ID_FIELD {
        return Some(document.id);
    }
    document
        .body
        .get(field)?
        .as_str()
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};
    use time::Duration;

    use super::*;
    use crate::application::{
        filter::{PRODUCT_FIELDS, build},
        pagination::PageRequest,
    };

    fn product(name: &str, price: f64, minutes_ago: i64) -> Document {
        let created_at = OffsetDateTime::now_utc() - Duration::minutes(minutes_ago);
        let mut body = Map::new();
        body.insert("name".into(), json!(name));
        body.insert("price".into(), json!(price));
        body.insert("sku".into(), json!(format!("SKU-{name}")));
        Document {
            id: Uuid::new_v4(),
            created_at,
            updated_at: created_at,
            body,
        }
    }

    async fn seeded() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        for (index, (name, price)) in [("Kettle", 40.0), ("Espresso Machine", 450.0), ("Grinder", 120.0)]
            .into_iter()
            .enumerate()
        {
            store
                .insert(Collection::Products, &product(name, price, index as i64))
                .await
                .expect("insert");
        }
        store
    }

    fn predicate(field: &str, operator: &str, value: serde_json::Value) -> QueryPredicate {
        let request = PageRequest::default().with_filter(
            Some(field.to_string()),
            Some(operator.to_string()),
            Some(value),
        );
        build(&request, &PRODUCT_FIELDS).expect("predicate")
    }

    #[tokio::test]
    async fn numeric_comparison_filters_documents() {
        let store = seeded().await;
        let count = store
            .count(Collection::Products, &predicate("price", "gte", json!(100)))
            .await
            .expect("count");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn pattern_match_ignores_case() {
        let store = seeded().await;
        let found = store
            .find(
                Collection::Products,
                &predicate("name", "contains", json!("MACHINE")),
                &FindOptions::default(),
            )
            .await
            .expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].body.get("name"), Some(&json!("Espresso Machine")));
    }

    #[tokio::test]
    async fn default_sort_is_newest_first_with_projection() {
        let store = seeded().await;
        let options = FindOptions {
            projection: &["name"],
            ..FindOptions::default()
        };
        let found = store
            .find(Collection::Products, &QueryPredicate::match_all(), &options)
            .await
            .expect("find");

        let names: Vec<_> = found
            .iter()
            .map(|document| document.body.get("name").cloned())
            .collect();
        assert_eq!(
            names,
            [Some(json!("Kettle")), Some(json!("Espresso Machine")), Some(json!("Grinder"))]
        );
        assert!(found.iter().all(|document| !document.body.contains_key("price")));
    }

    #[tokio::test]
    async fn unique_fields_are_enforced() {
        let store = seeded().await;
        let clash = product("Kettle", 10.0, 0);
        let err = store
            .insert(Collection::Products, &clash)
            .await
            .expect_err("duplicate sku");
        assert!(matches!(err, RepoError::Duplicate { constraint } if constraint == "products_sku_key"));
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_documents() {
        let store = InMemoryDocumentStore::new();
        let document = product("Tray", 5.0, 0);
        assert!(!store
            .update_by_id(Collection::Products, &document)
            .await
            .expect("update"));
        assert!(!store
            .delete_by_id(Collection::Products, document.id)
            .await
            .expect("delete"));
    }
}

//! Offset pagination: request shape, page envelope and the executor that
//! runs a count and a fetch against a [`DocumentStore`].

use std::num::NonZeroU32;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    application::{
        filter::{QueryPredicate, SortSpec},
        repos::{DocumentStore, FindOptions, RepoError},
    },
    domain::{document::Document, types::Collection},
};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("limit must be between 1 and {MAX_PAGE_LIMIT} (got {0})")]
    LimitOutOfRange(u32),
}

/// A validated page request.
///
/// `limit` is checked on construction; `page` is accepted as given and
/// clamped to at least 1 by the executor. Serialization is used to derive
/// cache keys, so every field takes part in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    page: u32,
    limit: Option<u32>,
    filter_field: Option<String>,
    filter_operator: Option<String>,
    filter_value: Option<Value>,
    sort_by: Option<String>,
    sort_order: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: None,
            filter_field: None,
            filter_operator: None,
            filter_value: None,
            sort_by: None,
            sort_order: None,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Result<Self, PaginationError> {
        if let Some(limit) = limit
            && !(1..=MAX_PAGE_LIMIT).contains(&limit)
        {
            return Err(PaginationError::LimitOutOfRange(limit));
        }

        Ok(Self {
            page: page.unwrap_or(1),
            limit,
            ..Self::default()
        })
    }

    pub fn with_filter(
        mut self,
        field: Option<String>,
        operator: Option<String>,
        value: Option<Value>,
    ) -> Self {
        self.filter_field = non_blank(field);
        self.filter_operator = non_blank(operator);
        self.filter_value = value.filter(|value| match value {
            Value::Null => false,
            Value::String(text) => !text.trim().is_empty(),
            _ => true,
        });
        self
    }

    pub fn with_sort(mut self, sort_by: Option<String>, sort_order: Option<String>) -> Self {
        self.sort_by = non_blank(sort_by);
        self.sort_order = non_blank(sort_order);
        self
    }

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn filter_field(&self) -> Option<&str> {
        self.filter_field.as_deref()
    }

    pub fn filter_operator(&self) -> Option<&str> {
        self.filter_operator.as_deref()
    }

    pub fn filter_value(&self) -> Option<&Value> {
        self.filter_value.as_ref()
    }

    pub fn sort_by(&self) -> Option<&str> {
        self.sort_by.as_deref()
    }

    pub fn sort_order(&self) -> Option<&str> {
        self.sort_order.as_deref()
    }

    /// Copy with page clamped and limit resolved, so equivalent requests
    /// serialize identically.
    pub fn normalized(&self, default_limit: NonZeroU32) -> Self {
        Self {
            page: self.page(),
            limit: Some(self.limit.unwrap_or(default_limit.get())),
            ..self.clone()
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Query-string form of a page request.
///
/// Accepts `filterValue` or the legacy `amount`, and `operator` or
/// `filterOperator`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub filter_field: Option<String>,
    #[serde(alias = "filterOperator")]
    pub operator: Option<String>,
    #[serde(alias = "amount")]
    pub filter_value: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl TryFrom<PageQuery> for PageRequest {
    type Error = PaginationError;

    fn try_from(query: PageQuery) -> Result<Self, Self::Error> {
        Ok(PageRequest::new(query.page, query.limit)?
            .with_filter(
                query.filter_field,
                query.operator,
                query.filter_value.map(Value::String),
            )
            .with_sort(query.sort_by, query.sort_order))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_records: u64,
    pub current_page: u32,
    pub total_pages: u64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total_records: u64, current_page: u32, limit: u32, data: Vec<T>) -> Self {
        Self {
            total_records,
            current_page,
            total_pages: total_pages(total_records, limit),
            data,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let data = self.data.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(Page {
            total_records: self.total_records,
            current_page: self.current_page,
            total_pages: self.total_pages,
            data,
        })
    }
}

pub fn total_pages(total_records: u64, limit: u32) -> u64 {
    if total_records == 0 || limit == 0 {
        return 0;
    }
    total_records.div_ceil(u64::from(limit))
}

/// Runs paged queries against a document store.
#[derive(Clone)]
pub struct PaginationExecutor {
    store: Arc<dyn DocumentStore>,
    default_limit: NonZeroU32,
}

impl PaginationExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, default_limit: NonZeroU32) -> Self {
        Self {
            store,
            default_limit,
        }
    }

    pub fn default_limit(&self) -> NonZeroU32 {
        self.default_limit
    }

    pub async fn execute(
        &self,
        collection: Collection,
        request: &PageRequest,
        predicate: &QueryPredicate,
        sort: SortSpec,
        projection: &[&str],
    ) -> Result<Page<Document>, RepoError> {
        let page = request.page();
        let limit = request.limit().unwrap_or(self.default_limit.get());
        let skip = u64::from(page - 1) * u64::from(limit);

        let options = FindOptions {
            sort,
            skip,
            limit: u64::from(limit),
            projection,
        };

        let (total_records, data) = tokio::try_join!(
            self.store.count(collection, predicate),
            self.store.find(collection, predicate, &options),
        )?;

        Ok(Page::new(total_records, page, limit, data))
    }
}

//! Filter and sort clause builder.
//!
//! Turns the loosely-typed filter portion of a [`PageRequest`] into a
//! [`QueryPredicate`] checked against a per-resource field catalog. Backends
//! only ever receive predicates produced here.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{
    application::pagination::PageRequest,
    domain::document::{CREATED_AT_FIELD, ID_FIELD},
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("unsupported filter operator `{0}`")]
    UnsupportedOperator(String),
    #[error("invalid filter field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

impl FilterError {
    fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
        }
    }

    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            FilterOperator::Gt | FilterOperator::Lt | FilterOperator::Gte | FilterOperator::Lte
        )
    }

    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith
        )
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the operator names, their `$`-prefixed forms and the comparison
/// symbols used by the `operator` query parameter.
impl FromStr for FilterOperator {
    type Err = FilterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let operator = match name {
            "eq" | "=" | "==" => FilterOperator::Eq,
            "ne" | "!=" | "<>" => FilterOperator::Ne,
            "contains" => FilterOperator::Contains,
            "startsWith" => FilterOperator::StartsWith,
            "endsWith" => FilterOperator::EndsWith,
            "gt" | ">" => FilterOperator::Gt,
            "lt" | "<" => FilterOperator::Lt,
            "gte" | ">=" => FilterOperator::Gte,
            "lte" | "<=" => FilterOperator::Lte,
            _ => return Err(FilterError::UnsupportedOperator(trimmed.to_string())),
        };
        Ok(operator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Timestamp,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Fields a resource exposes for filtering and sorting.
#[derive(Debug, Clone, Copy)]
pub struct FieldCatalog {
    fields: &'static [FieldSpec],
    default_filter_field: Option<&'static str>,
}

impl FieldCatalog {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self {
            fields,
            default_filter_field: None,
        }
    }

    /// `default_filter_field` is used when a value and operator arrive
    /// without `filterField`.
    pub const fn with_default_filter_field(
        fields: &'static [FieldSpec],
        default_filter_field: &'static str,
    ) -> Self {
        Self {
            fields,
            default_filter_field: Some(default_filter_field),
        }
    }

    pub fn get(&self, name: &str) -> Option<FieldSpec> {
        self.fields.iter().copied().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|spec| spec.name)
    }
}

const CATEGORY_FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec::new(ID_FIELD, FieldKind::Id),
    FieldSpec::new("name", FieldKind::Text),
    FieldSpec::new("description", FieldKind::Text),
    FieldSpec::new(CREATED_AT_FIELD, FieldKind::Timestamp),
];

const PRODUCT_FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec::new(ID_FIELD, FieldKind::Id),
    FieldSpec::new("name", FieldKind::Text),
    FieldSpec::new("description", FieldKind::Text),
    FieldSpec::new("sku", FieldKind::Text),
    FieldSpec::new("price", FieldKind::Number),
    FieldSpec::new("stockQuantity", FieldKind::Number),
    FieldSpec::new("categoryId", FieldKind::Id),
    FieldSpec::new("available", FieldKind::Bool),
    FieldSpec::new(CREATED_AT_FIELD, FieldKind::Timestamp),
];

const USER_FIELD_SPECS: &[FieldSpec] = &[
    FieldSpec::new(ID_FIELD, FieldKind::Id),
    FieldSpec::new("email", FieldKind::Text),
    FieldSpec::new("role", FieldKind::Text),
    FieldSpec::new(CREATED_AT_FIELD, FieldKind::Timestamp),
];

pub const CATEGORY_FIELDS: FieldCatalog = FieldCatalog::new(CATEGORY_FIELD_SPECS);
pub const PRODUCT_FIELDS: FieldCatalog =
    FieldCatalog::with_default_filter_field(PRODUCT_FIELD_SPECS, "price");
pub const USER_FIELDS: FieldCatalog = FieldCatalog::new(USER_FIELD_SPECS);

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(OffsetDateTime),
    Id(Uuid),
}

impl FilterValue {
    fn to_json(&self) -> Result<Value, FilterError> {
        let value = match self {
            FilterValue::Text(text) => Value::String(text.clone()),
            FilterValue::Number(number) => Value::from(*number),
            FilterValue::Bool(flag) => Value::Bool(*flag),
            FilterValue::Timestamp(at) => at
                .format(&Rfc3339)
                .map(Value::String)
                .map_err(|err| FilterError::InvalidFilter(err.to_string()))?,
            FilterValue::Id(id) => Value::String(id.to_string()),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    pub(crate) field: &'static str,
    pub(crate) operator: FilterOperator,
    pub(crate) value: FilterValue,
}

/// Conjunction of field conditions; empty matches every document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPredicate {
    conditions: Vec<Condition>,
}

impl QueryPredicate {
    pub(crate) fn match_all() -> Self {
        Self::default()
    }

    /// Exact text match, used for uniqueness lookups on catalog text fields.
    pub(crate) fn text_equals(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            conditions: vec![Condition {
                field,
                operator: FilterOperator::Eq,
                value: FilterValue::Text(value.into()),
            }],
        }
    }

    pub(crate) fn excluding_id(mut self, id: Uuid) -> Self {
        self.conditions.push(Condition {
            field: ID_FIELD,
            operator: FilterOperator::Ne,
            value: FilterValue::Id(id),
        });
        self
    }

    pub fn is_match_all(&self) -> bool {
        self.conditions.is_empty()
    }

    pub(crate) fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = FilterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "1" => Ok(SortOrder::Asc),
            "desc" | "-1" => Ok(SortOrder::Desc),
            other => Err(FilterError::InvalidFilter(format!(
                "sortOrder must be `asc` or `desc` (got `{other}`)"
            ))),
        }
    }
}

/// Ordering for a page fetch; ties are always broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub(crate) field: &'static str,
    pub(crate) kind: FieldKind,
    pub(crate) order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: CREATED_AT_FIELD,
            kind: FieldKind::Timestamp,
            order: SortOrder::Desc,
        }
    }
}

impl SortSpec {
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }
}

/// Build the predicate for `request` against `catalog`.
pub fn build(request: &PageRequest, catalog: &FieldCatalog) -> Result<QueryPredicate, FilterError> {
    let value = request.filter_value().filter(|value| !value.is_null());
    let operator = request.filter_operator();

    let (value, operator) = match (value, operator) {
        (None, None) => return Ok(QueryPredicate::match_all()),
        (Some(value), Some(operator)) => (value, operator),
        (Some(_), None) => {
            return Err(FilterError::InvalidFilter(
                "filterValue was supplied without filterOperator".into(),
            ));
        }
        (None, Some(_)) => {
            return Err(FilterError::InvalidFilter(
                "filterOperator was supplied without filterValue".into(),
            ));
        }
    };

    let operator: FilterOperator = operator.parse()?;

    let field_name = match request.filter_field() {
        Some(name) => name,
        None => catalog.default_filter_field.ok_or_else(|| {
            FilterError::invalid_field("", "filterField is required for this resource")
        })?,
    };
    let spec = catalog
        .get(field_name)
        .ok_or_else(|| FilterError::invalid_field(field_name, "field is not filterable"))?;

    check_operator(spec, operator)?;
    let value = coerce(spec, value)?;

    Ok(QueryPredicate {
        conditions: vec![Condition {
            field: spec.name,
            operator,
            value,
        }],
    })
}

/// Resolve the requested ordering, defaulting to newest first.
pub fn build_sort(request: &PageRequest, catalog: &FieldCatalog) -> Result<SortSpec, FilterError> {
    let order = request
        .sort_order()
        .map(str::parse::<SortOrder>)
        .transpose()?
        .unwrap_or_default();

    let Some(field_name) = request.sort_by() else {
        return Ok(SortSpec {
            order,
            ..SortSpec::default()
        });
    };

    let spec = catalog
        .get(field_name)
        .ok_or_else(|| FilterError::invalid_field(field_name, "field is not sortable"))?;

    Ok(SortSpec {
        field: spec.name,
        kind: spec.kind,
        order,
    })
}

/// Rewrite `request` with the resolved field, operator name, coerced value
/// and explicit sort, so equivalent requests compare and serialize equal.
pub fn canonical_request(
    request: &PageRequest,
    catalog: &FieldCatalog,
) -> Result<PageRequest, FilterError> {
    let predicate = build(request, catalog)?;
    let sort = build_sort(request, catalog)?;

    let canonical = match predicate.conditions.first() {
        Some(condition) => request.clone().with_filter(
            Some(condition.field.to_string()),
            Some(condition.operator.as_str().to_string()),
            Some(condition.value.to_json()?),
        ),
        None => request.clone().with_filter(None, None, None),
    };
    Ok(canonical.with_sort(
        Some(sort.field.to_string()),
        Some(sort.order.as_str().to_string()),
    ))
}

fn check_operator(spec: FieldSpec, operator: FilterOperator) -> Result<(), FilterError> {
    if operator.is_ordered() && !matches!(spec.kind, FieldKind::Number | FieldKind::Timestamp) {
        return Err(FilterError::invalid_field(
            spec.name,
            format!("operator `{operator}` requires a numeric or date field"),
        ));
    }
    if operator.is_pattern() && spec.kind != FieldKind::Text {
        return Err(FilterError::invalid_field(
            spec.name,
            format!("operator `{operator}` requires a text field"),
        ));
    }
    Ok(())
}

fn coerce(spec: FieldSpec, value: &Value) -> Result<FilterValue, FilterError> {
    let mismatch = || {
        FilterError::InvalidFilter(format!(
            "value {value} is not valid for field `{}`",
            spec.name
        ))
    };

    match (spec.kind, value) {
        (FieldKind::Text, Value::String(text)) => Ok(FilterValue::Text(text.clone())),
        (FieldKind::Text, Value::Number(number)) => Ok(FilterValue::Text(number.to_string())),
        (FieldKind::Number, Value::Number(number)) => {
            number.as_f64().map(FilterValue::Number).ok_or_else(mismatch)
        }
        (FieldKind::Number, Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(FilterValue::Number)
            .ok_or_else(mismatch),
        (FieldKind::Bool, Value::Bool(flag)) => Ok(FilterValue::Bool(*flag)),
        (FieldKind::Bool, Value::String(text)) => match text.trim() {
            "true" => Ok(FilterValue::Bool(true)),
            "false" => Ok(FilterValue::Bool(false)),
            _ => Err(mismatch()),
        },
        (FieldKind::Timestamp, Value::String(text)) => OffsetDateTime::parse(text.trim(), &Rfc3339)
            .map(FilterValue::Timestamp)
            .map_err(|_| mismatch()),
        (FieldKind::Id, Value::String(text)) => Uuid::parse_str(text.trim())
            .map(FilterValue::Id)
            .map_err(|_| mismatch()),
        _ => Err(mismatch()),
    }
}

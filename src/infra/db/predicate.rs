//! Translation of predicates and sort specs into SQL over the `documents`
//! table. Every value and body key is bound; only column names and
//! operators are written into the statement text.

use sqlx::{Postgres, QueryBuilder};

use crate::{
    application::filter::{
        Condition, FieldKind, FilterOperator, FilterValue, QueryPredicate, SortOrder, SortSpec,
    },
    domain::{
        document::{CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD},
        types::Collection,
    },
};

use super::util::escape_like;

pub(crate) fn push_where(
    qb: &mut QueryBuilder<'_, Postgres>,
    collection: Collection,
    predicate: &QueryPredicate,
) {
    qb.push(" WHERE collection = ");
    qb.push_bind(collection.as_str());
    for condition in predicate.conditions() {
        qb.push(" AND ");
        push_condition(qb, condition);
    }
}

pub(crate) fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, sort: &SortSpec) {
    let (direction, nulls) = match sort.order() {
        SortOrder::Asc => ("ASC", "NULLS FIRST"),
        SortOrder::Desc => ("DESC", "NULLS LAST"),
    };
    qb.push(" ORDER BY ");
    push_field_expr(qb, sort.field(), sort.kind);
    qb.push(format!(" {direction} {nulls}, id {direction}"));
}

fn push_condition(qb: &mut QueryBuilder<'_, Postgres>, condition: &Condition) {
    let kind = match condition.value {
        FilterValue::Text(_) => FieldKind::Text,
        FilterValue::Number(_) => FieldKind::Number,
        FilterValue::Bool(_) => FieldKind::Bool,
        FilterValue::Timestamp(_) => FieldKind::Timestamp,
        FilterValue::Id(_) => FieldKind::Id,
    };

    push_field_expr(qb, condition.field, kind);

    if condition.operator.is_pattern() {
        let FilterValue::Text(needle) = &condition.value else {
            qb.push(" IS NULL AND FALSE");
            return;
        };
        let needle = escape_like(needle);
        let pattern = match condition.operator {
            FilterOperator::StartsWith => format!("{needle}%"),
            FilterOperator::EndsWith => format!("%{needle}"),
            _ => format!("%{needle}%"),
        };
        qb.push(" ILIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\'");
        return;
    }

    qb.push(match condition.operator {
        FilterOperator::Eq => " = ",
        FilterOperator::Ne => " IS DISTINCT FROM ",
        FilterOperator::Gt => " > ",
        FilterOperator::Lt => " < ",
        FilterOperator::Gte => " >= ",
        FilterOperator::Lte => " <= ",
        FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => " = ",
    });

    match &condition.value {
        FilterValue::Text(text) => qb.push_bind(text.clone()),
        FilterValue::Number(number) => qb.push_bind(*number),
        FilterValue::Bool(flag) => qb.push_bind(*flag),
        FilterValue::Timestamp(at) => qb.push_bind(*at),
        FilterValue::Id(id) if condition.field == ID_FIELD => qb.push_bind(*id),
        FilterValue::Id(id) => qb.push_bind(id.to_string()),
    };
}

fn push_field_expr(qb: &mut QueryBuilder<'_, Postgres>, field: &str, kind: FieldKind) {
    match (field, kind) {
        (ID_FIELD, _) => {
            qb.push("id");
        }
        (CREATED_AT_FIELD, _) => {
            qb.push("created_at");
        }
        (UPDATED_AT_FIELD, _) => {
            qb.push("updated_at");
        }
        (_, FieldKind::Number) => {
            qb.push("(body ->> ");
            qb.push_bind(field.to_string());
            qb.push(")::double precision");
        }
        (_, FieldKind::Bool) => {
            qb.push("(body ->> ");
            qb.push_bind(field.to_string());
            qb.push(")::boolean");
        }
        (_, FieldKind::Text | FieldKind::Id | FieldKind::Timestamp) => {
            qb.push("(body ->> ");
            qb.push_bind(field.to_string());
            qb.push(")");
        }
    }
}

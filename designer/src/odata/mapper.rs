//! OData response records → flat rows keyed by `<entityAlias>.<fieldName>`.

use dataverse::annotations::{Record, formatted_value};
use serde_json::Value;

use super::naming::navigation_property_for;
use crate::models::{QueryColumn, QueryDefinition, QueryField, Row};

/// One column per distinct field. Attribute typing is not resolved here, so
/// every column reports `string`.
pub fn columns(query: &QueryDefinition) -> Vec<QueryColumn> {
    query
        .distinct_fields()
        .into_iter()
        .map(|field| QueryColumn {
            name: field.field_name.clone(),
            display_name: field
                .display_name
                .clone()
                .unwrap_or_else(|| field.field_name.clone()),
            column_type: "string".to_string(),
            entity_alias: field.entity_alias.clone(),
        })
        .collect()
}

/// Every row carries exactly one key per distinct field; values that are
/// absent from the record come out as `null`.
pub fn map_rows(records: &[Value], query: &QueryDefinition) -> Vec<Row> {
    let fields = query.distinct_fields();
    records
        .iter()
        .map(|record| map_record(record, query, &fields))
        .collect()
}

fn map_record(record: &Value, query: &QueryDefinition, fields: &[&QueryField]) -> Row {
    let mut row = Row::new();
    for field in fields {
        let value = match record.as_object() {
            Some(record) if query.is_primary(&field.entity_alias) => primary_value(record, field),
            Some(record) => joined_value(record, query, field),
            None => None,
        };
        row.insert(field.key(), value.cloned().unwrap_or(Value::Null));
    }
    row
}

/// Formatted value first, so choices and lookups read as labels.
fn primary_value<'a>(record: &'a Record, field: &QueryField) -> Option<&'a Value> {
    defined(formatted_value(record, &field.field_name))
        .or_else(|| defined(record.get(&field.field_name)))
}

/// Expanded entity first, then the top-level formatted value, then the
/// top-level raw value. The first non-null value wins.
fn joined_value<'a>(
    record: &'a Record,
    query: &QueryDefinition,
    field: &QueryField,
) -> Option<&'a Value> {
    defined(
        expanded(record, query, &field.entity_alias)
            .and_then(|entity| entity.get(&field.field_name)),
    )
    .or_else(|| defined(formatted_value(record, &field.field_name)))
    .or_else(|| defined(record.get(&field.field_name)))
}

fn defined(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// The expanded object for `alias`. Looked up under the alias itself, then
/// by walking the join chain, where each level may be keyed by alias or by
/// navigation property.
fn expanded<'a>(record: &'a Record, query: &QueryDefinition, alias: &str) -> Option<&'a Record> {
    if let Some(entity) = record.get(alias).and_then(Value::as_object) {
        return Some(entity);
    }

    let path = query.join_path(alias);
    if path.is_empty() {
        return None;
    }

    let mut current = record;
    for join in path {
        current = current
            .get(&join.to_entity_alias)
            .and_then(Value::as_object)
            .or_else(|| {
                current
                    .get(navigation_property_for(join))
                    .and_then(Value::as_object)
            })?;
    }
    Some(current)
}

//! QueryDefinition → OData v4 query string.
//!
//! The output is the suffix appended to the entity-set path, starting with
//! `?`. Parameters are emitted in a fixed order: `$count`, `$select`,
//! `$expand`, `$filter`, `$orderby`, `$top`, `$skip`. The compiler does not
//! validate; see `services::validation` for that.

use serde_json::Value;

use super::naming::{encode_param, navigation_property_for, quote_literal};
use crate::models::{FilterOperator, QueryDefinition, QueryField, QueryFilter, QueryJoin};

pub fn compile(query: &QueryDefinition, page: u32, page_size: u32, count_only: bool) -> String {
    let fields = query.distinct_fields();
    let mut params = vec!["$count=true".to_string()];

    let select = select_list(&fields, query.primary_alias());
    if !select.is_empty() {
        params.push(format!("$select={}", select));
    }

    let expands = child_expands(query, &fields, query.primary_alias(), 0);
    if !expands.is_empty() {
        params.push(format!("$expand={}", expands.join(",")));
    }

    let filter = filter_expression(query);
    if !filter.is_empty() {
        params.push(format!("$filter={}", encode_param(&filter)));
    }

    let order_by = order_by_list(query);
    if !order_by.is_empty() {
        params.push(format!("$orderby={}", order_by));
    }

    if count_only {
        params.push("$top=0".to_string());
    } else {
        params.push(format!("$top={}", page_size));
        if page > 1 {
            let skip = u64::from(page - 1) * u64::from(page_size);
            params.push(format!("$skip={}", skip));
        }
    }

    format!("?{}", params.join("&"))
}

fn select_list(fields: &[&QueryField], alias: &str) -> String {
    fields
        .iter()
        .filter(|field| field.entity_alias == alias)
        .map(|field| field.field_name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Expands for the joins hanging off `parent`. Joins with nothing selected
/// below them emit nothing.
fn child_expands(
    query: &QueryDefinition,
    fields: &[&QueryField],
    parent: &str,
    depth: usize,
) -> Vec<String> {
    if depth > query.joins().len() {
        return Vec::new();
    }

    query
        .joins()
        .iter()
        .filter(|join| query.parent_alias(join) == parent)
        .filter_map(|join| render_expand(query, fields, join, depth))
        .collect()
}

fn render_expand(
    query: &QueryDefinition,
    fields: &[&QueryField],
    join: &QueryJoin,
    depth: usize,
) -> Option<String> {
    let select = select_list(fields, &join.to_entity_alias);
    let nested = child_expands(query, fields, &join.to_entity_alias, depth + 1);

    let mut options = Vec::new();
    if !select.is_empty() {
        options.push(format!("$select={}", select));
    }
    if !nested.is_empty() {
        options.push(format!("$expand={}", nested.join(",")));
    }
    if options.is_empty() {
        return None;
    }

    Some(format!("{}({})", navigation_property_for(join), options.join(";")))
}

/// Property path for a field: bare for the primary alias, prefixed with the
/// navigation chain for joined aliases (`primarycontact/fullname`).
pub fn property_path(query: &QueryDefinition, alias: &str, field_name: &str) -> String {
    let mut segments: Vec<&str> = query
        .join_path(alias)
        .into_iter()
        .map(navigation_property_for)
        .collect();
    segments.push(field_name);
    segments.join("/")
}

/// Filters joined left to right. Each filter after the first is prefixed by
/// its own logical operator (default `and`); there is no grouping.
pub fn filter_expression(query: &QueryDefinition) -> String {
    query
        .filters()
        .iter()
        .enumerate()
        .map(|(index, filter)| {
            let path = property_path(query, &filter.entity_alias, &filter.field_name);
            let predicate = render_predicate(&path, filter);
            if index == 0 {
                predicate
            } else {
                let operator = filter.logical_operator.unwrap_or_default();
                format!("{} {}", operator.as_str(), predicate)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_predicate(path: &str, filter: &QueryFilter) -> String {
    let value = filter.value.as_ref();
    match filter.operator {
        FilterOperator::Eq => equality(path, "eq", value),
        FilterOperator::Ne => equality(path, "ne", value),
        FilterOperator::Gt => format!("{} gt {}", path, bare(value)),
        FilterOperator::Ge => format!("{} ge {}", path, bare(value)),
        FilterOperator::Lt => format!("{} lt {}", path, bare(value)),
        FilterOperator::Le => format!("{} le {}", path, bare(value)),
        FilterOperator::Contains => format!("contains({},{})", path, quoted(value)),
        FilterOperator::StartsWith => format!("startswith({},{})", path, quoted(value)),
        FilterOperator::EndsWith => format!("endswith({},{})", path, quoted(value)),
        FilterOperator::Null => format!("{} eq null", path),
        FilterOperator::NotNull => format!("{} ne null", path),
        FilterOperator::Unrecognized => format!("{} eq {}", path, quoted(value)),
    }
}

/// Strings are quoted, everything else is written as its JSON literal.
fn equality(path: &str, operator: &str, value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => format!("{} {} {}", path, operator, quote_literal(text)),
        other => format!("{} {} {}", path, operator, bare(other)),
    }
}

fn bare(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn quoted(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => quote_literal(""),
        Some(Value::String(text)) => quote_literal(text),
        Some(other) => quote_literal(&other.to_string()),
    }
}

fn order_by_list(query: &QueryDefinition) -> String {
    query
        .sorts()
        .iter()
        .map(|sort| {
            format!(
                "{} {}",
                property_path(query, &sort.entity_alias, &sort.field_name),
                sort.direction.unwrap_or_default().as_str()
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

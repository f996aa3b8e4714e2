use common::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::models::QueryDefinition;

static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier regex"));

// Bare literals accepted for gt/ge/lt/le: numbers, dates, datetimes, GUIDs.
static COMPARISON_LITERAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9:.+\-]*$").expect("Invalid literal regex"));

fn identifier(kind: &str, value: &str) -> Result<()> {
    if IDENTIFIER_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid {}: '{}'", kind, value)))
    }
}

/// Checks a definition before anything is sent to Dataverse.
pub fn validate_query(query: &QueryDefinition) -> Result<()> {
    if query.primary_entity.trim().is_empty() {
        return Err(Error::Validation("primary entity is required".to_string()));
    }
    if query.fields.is_empty() {
        return Err(Error::Validation("at least one field must be selected".to_string()));
    }

    identifier("entity name", &query.primary_entity)?;

    let mut aliases = HashSet::new();
    for join in query.joins() {
        identifier("join field", &join.from_field)?;
        identifier("join entity", &join.to_entity)?;
        if let Some(navigation) = join.navigation_property.as_deref().filter(|n| !n.is_empty()) {
            identifier("navigation property", navigation)?;
        }
        if query.is_primary(&join.to_entity_alias)
            || !aliases.insert(join.to_entity_alias.as_str())
        {
            return Err(Error::Validation(format!(
                "duplicate entity alias: '{}'",
                join.to_entity_alias
            )));
        }
    }

    for field in &query.fields {
        identifier("field name", &field.field_name)?;
    }

    for filter in query.filters() {
        identifier("filter field", &filter.field_name)?;
        if filter.operator.is_comparison() {
            if let Some(Value::String(text)) = &filter.value {
                if !COMPARISON_LITERAL_REGEX.is_match(text) {
                    return Err(Error::Validation(format!(
                        "value for '{}' is not a plain literal: '{}'",
                        filter.field_name, text
                    )));
                }
            }
        }
    }

    for sort in query.sorts() {
        identifier("sort field", &sort.field_name)?;
    }

    Ok(())
}

/// `page` is 1-based; `page_size` must fit under the configured ceiling.
pub fn validate_page(page: u32, page_size: u32, max_page_size: u32) -> Result<()> {
    if page == 0 {
        return Err(Error::Validation("page must be 1 or greater".to_string()));
    }
    if page_size == 0 || page_size > max_page_size {
        return Err(Error::Validation(format!(
            "page size must be between 1 and {}",
            max_page_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterOperator, QueryFilter, QueryJoin};
    use crate::testing::account_query;
    use serde_json::json;

    fn join(alias: &str) -> QueryJoin {
        QueryJoin {
            from_entity_alias: "main".into(),
            from_field: "primarycontactid".into(),
            to_entity: "contact".into(),
            to_entity_alias: alias.into(),
            to_field: "contactid".into(),
            join_type: None,
            navigation_property: None,
        }
    }

    fn comparison(value: Value) -> QueryFilter {
        QueryFilter {
            entity_alias: "main".into(),
            field_name: "createdon".into(),
            operator: FilterOperator::Ge,
            value: Some(value),
            logical_operator: None,
        }
    }

    #[test]
    fn test_accepts_well_formed_query() {
        let mut query = account_query("env-1");
        query.joins = Some(vec![join("pc"), join("pc2")]);
        query.filters = Some(vec![
            comparison(json!("2024-01-01T00:00:00Z")),
            comparison(json!(5)),
        ]);
        assert!(validate_query(&query).is_ok());
    }

    #[test]
    fn test_rejects_missing_entity_or_fields() {
        let mut query = account_query("env-1");
        query.primary_entity = "  ".into();
        assert!(matches!(validate_query(&query), Err(Error::Validation(_))));

        let mut query = account_query("env-1");
        query.fields.clear();
        assert!(matches!(validate_query(&query), Err(Error::Validation(_))));
    }

    #[test]
    fn test_rejects_duplicate_aliases() {
        let mut query = account_query("env-1");
        query.joins = Some(vec![join("pc"), join("pc")]);
        assert!(matches!(validate_query(&query), Err(Error::Validation(_))));

        query.joins = Some(vec![join("main")]);
        assert!(matches!(validate_query(&query), Err(Error::Validation(_))));
    }

    #[test]
    fn test_rejects_injected_identifiers_and_literals() {
        let mut query = account_query("env-1");
        query.fields[0].field_name = "name,revenue&$top=1".into();
        assert!(matches!(validate_query(&query), Err(Error::Validation(_))));

        let mut query = account_query("env-1");
        query.filters = Some(vec![comparison(json!("5 or 1 eq 1"))]);
        assert!(matches!(validate_query(&query), Err(Error::Validation(_))));
    }

    #[test]
    fn test_page_bounds() {
        assert!(validate_page(1, 50, 5000).is_ok());
        assert!(validate_page(0, 50, 5000).is_err());
        assert!(validate_page(1, 0, 5000).is_err());
        assert!(validate_page(1, 5001, 5000).is_err());
        assert!(validate_page(1, 5000, 5000).is_ok());
    }
}

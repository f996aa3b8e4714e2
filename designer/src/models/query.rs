use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PRIMARY_ALIAS: &str = "main";

/// A query built in the designer: one primary entity, the columns to pull
/// from it and from joined entities, filters, sorts and an optional row cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDefinition {
    pub environment_id: String,
    pub primary_entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_entity_alias: Option<String>,
    pub fields: Vec<QueryField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joins: Option<Vec<QueryJoin>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<QueryFilter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<QuerySort>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
}

impl QueryDefinition {
    pub fn primary_alias(&self) -> &str {
        self.primary_entity_alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .unwrap_or(DEFAULT_PRIMARY_ALIAS)
    }

    pub fn joins(&self) -> &[QueryJoin] {
        self.joins.as_deref().unwrap_or(&[])
    }

    pub fn filters(&self) -> &[QueryFilter] {
        self.filters.as_deref().unwrap_or(&[])
    }

    pub fn sorts(&self) -> &[QuerySort] {
        self.order_by.as_deref().unwrap_or(&[])
    }

    pub fn is_primary(&self, alias: &str) -> bool {
        alias == self.primary_alias()
    }

    pub fn join_for(&self, alias: &str) -> Option<&QueryJoin> {
        self.joins().iter().find(|join| join.to_entity_alias == alias)
    }

    /// Alias a join hangs off: the join named by `fromEntityAlias`, or the
    /// primary alias when that names no other join.
    pub fn parent_alias<'a>(&'a self, join: &'a QueryJoin) -> &'a str {
        match self.join_for(&join.from_entity_alias) {
            Some(parent) if !std::ptr::eq(parent, join) => &join.from_entity_alias,
            _ => self.primary_alias(),
        }
    }

    /// Joins leading from the primary entity to `alias`, outermost first.
    /// Empty for the primary alias and for aliases no join declares.
    pub fn join_path(&self, alias: &str) -> Vec<&QueryJoin> {
        let mut path: Vec<&QueryJoin> = Vec::new();
        if self.is_primary(alias) {
            return path;
        }

        let mut current = alias;
        while let Some(join) = self.join_for(current) {
            if path.iter().any(|seen| std::ptr::eq(*seen, join)) {
                break;
            }
            path.push(join);
            current = self.parent_alias(join);
            if self.is_primary(current) {
                break;
            }
        }

        path.reverse();
        path
    }

    /// Fields with duplicate `(entityAlias, fieldName)` pairs collapsed,
    /// first occurrence wins.
    pub fn distinct_fields(&self) -> Vec<&QueryField> {
        let mut seen = std::collections::HashSet::new();
        self.fields
            .iter()
            .filter(|field| seen.insert((field.entity_alias.as_str(), field.field_name.as_str())))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryField {
    pub entity_alias: String,
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
}

impl QueryField {
    /// Row key: `<entityAlias>.<fieldName>`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.entity_alias, self.field_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryJoin {
    pub from_entity_alias: String,
    pub from_field: String,
    pub to_entity: String,
    pub to_entity_alias: String,
    pub to_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    /// Explicit navigation property, typically copied from relationship
    /// metadata. Overrides the name derived from `fromField`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_property: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
    Null,
    NotNull,
    #[serde(other)]
    Unrecognized,
}

impl FilterOperator {
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Gt | Self::Ge | Self::Lt | Self::Le)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    pub entity_alias: String,
    pub field_name: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySort {
    pub entity_alias: String,
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_designer_payload() {
        let query: QueryDefinition = serde_json::from_value(json!({
            "environmentId": "env-1",
            "primaryEntity": "account",
            "fields": [
                { "entityAlias": "main", "fieldName": "name", "displayName": "Account Name" },
                { "entityAlias": "contact_1", "fieldName": "fullname" }
            ],
            "joins": [{
                "fromEntityAlias": "main", "fromField": "primarycontactid",
                "toEntity": "contact", "toEntityAlias": "contact_1", "toField": "contactid"
            }],
            "filters": [
                { "entityAlias": "main", "fieldName": "name", "operator": "startswith", "value": "A" },
                { "entityAlias": "main", "fieldName": "revenue", "operator": "between", "value": 5, "logicalOperator": "or" }
            ],
            "orderBy": [{ "entityAlias": "main", "fieldName": "name", "direction": "desc" }]
        }))
        .unwrap();

        assert_eq!(query.primary_alias(), "main");
        assert_eq!(query.joins().len(), 1);
        assert_eq!(query.filters()[0].operator, FilterOperator::StartsWith);
        assert_eq!(query.filters()[1].operator, FilterOperator::Unrecognized);
        assert_eq!(query.filters()[1].logical_operator, Some(LogicalOperator::Or));
        assert_eq!(query.sorts()[0].direction, Some(SortDirection::Desc));
        assert!(query.join_for("contact_1").is_some());
        assert_eq!(query.fields[1].key(), "contact_1.fullname");
    }

    #[test]
    fn test_primary_alias_override_and_empty() {
        let mut query: QueryDefinition = serde_json::from_value(json!({
            "environmentId": "env-1",
            "primaryEntity": "account",
            "primaryEntityAlias": "a",
            "fields": []
        }))
        .unwrap();
        assert_eq!(query.primary_alias(), "a");
        assert!(query.is_primary("a"));

        query.primary_entity_alias = Some(String::new());
        assert_eq!(query.primary_alias(), DEFAULT_PRIMARY_ALIAS);
    }

    #[test]
    fn test_distinct_fields_keeps_first() {
        let field = |alias: &str, name: &str, display: &str| QueryField {
            entity_alias: alias.into(),
            field_name: name.into(),
            display_name: Some(display.into()),
            aggregation: None,
        };
        let query = QueryDefinition {
            environment_id: "env-1".into(),
            primary_entity: "account".into(),
            primary_entity_alias: None,
            fields: vec![
                field("main", "name", "First"),
                field("main", "name", "Second"),
                field("c", "name", "Contact"),
            ],
            joins: None,
            filters: None,
            order_by: None,
            top: None,
        };

        let distinct = query.distinct_fields();
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0].display_name.as_deref(), Some("First"));
    }

    #[test]
    fn test_join_path_walks_nested_joins() {
        let join = |from: &str, field: &str, to: &str| QueryJoin {
            from_entity_alias: from.into(),
            from_field: field.into(),
            to_entity: "x".into(),
            to_entity_alias: to.into(),
            to_field: "xid".into(),
            join_type: None,
            navigation_property: None,
        };
        let query = QueryDefinition {
            environment_id: "env-1".into(),
            primary_entity: "opportunity".into(),
            primary_entity_alias: None,
            fields: vec![],
            joins: Some(vec![
                join("main", "parentaccountid", "acct"),
                join("acct", "primarycontactid", "pc"),
                join("loop_b", "aid", "loop_a"),
                join("loop_a", "bid", "loop_b"),
            ]),
            filters: None,
            order_by: None,
            top: None,
        };

        let path: Vec<&str> = query
            .join_path("pc")
            .iter()
            .map(|j| j.to_entity_alias.as_str())
            .collect();
        assert_eq!(path, vec!["acct", "pc"]);
        assert!(query.join_path("main").is_empty());
        assert!(query.join_path("unknown").is_empty());
        assert_eq!(query.parent_alias(&query.joins()[0]), "main");

        // Cyclic joins terminate.
        assert_eq!(query.join_path("loop_a").len(), 2);
    }
}

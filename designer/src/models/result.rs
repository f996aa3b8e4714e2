use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One output row keyed by `<entityAlias>.<fieldName>`.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryColumn {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub entity_alias: String,
}

impl QueryColumn {
    pub fn key(&self) -> String {
        format!("{}.{}", self.entity_alias, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<QueryColumn>,
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    pub page: u32,
    pub page_size: u32,
    /// True when the page came back full. A final page holding exactly
    /// `page_size` rows also reports true.
    pub has_more: bool,
    /// Wall-clock milliseconds for the whole execution.
    pub execution_time: u64,
}

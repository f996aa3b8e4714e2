use chrono::{DateTime, Utc};
use common::Result;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use uuid::Uuid;

use super::query::QueryDefinition;

/// The definition is held as the exact JSON the client sent, so keys and
/// operators this service does not model survive a save and load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub id: Uuid,
    pub user_id: String,
    pub environment_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub definition: Box<RawValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedQuery {
    pub fn query(&self) -> Result<QueryDefinition> {
        parse_definition(&self.definition)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavedQuery {
    pub environment_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub definition: Box<RawValue>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQueryUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub definition: Option<Box<RawValue>>,
}

pub fn parse_definition(raw: &RawValue) -> Result<QueryDefinition> {
    Ok(serde_json::from_str(raw.get())?)
}

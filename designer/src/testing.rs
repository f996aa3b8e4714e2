//! In-process stand-ins for Dataverse and the identity provider.

use async_trait::async_trait;
use common::{Error, Result};
use dataverse::{AccessToken, DataverseApi, Environment, TokenProvider};
use serde_json::value::RawValue;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{QueryDefinition, QueryField};

pub fn environment(id: &str, user_id: &str) -> Environment {
    Environment {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: format!("Org {}", id),
        org_url: "https://contoso.crm.dynamics.com".to_string(),
        tenant_id: "tenant".to_string(),
        client_id: "client".to_string(),
        client_secret: "client-secret-value".to_string(),
    }
}

pub fn account_query(environment_id: &str) -> QueryDefinition {
    QueryDefinition {
        environment_id: environment_id.to_string(),
        primary_entity: "account".to_string(),
        primary_entity_alias: None,
        fields: vec![
            QueryField {
                entity_alias: "main".to_string(),
                field_name: "name".to_string(),
                display_name: Some("Account Name".to_string()),
                aggregation: None,
            },
            QueryField {
                entity_alias: "main".to_string(),
                field_name: "revenue".to_string(),
                display_name: None,
                aggregation: None,
            },
        ],
        joins: None,
        filters: None,
        order_by: None,
        top: None,
    }
}

/// JSON text as a client would send it for a saved query.
pub fn definition_json(text: &str) -> Box<RawValue> {
    RawValue::from_string(text.to_string()).unwrap()
}

/// `count` account records named `Account 1..=count`.
pub fn account_records(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|i| json!({ "name": format!("Account {}", i), "revenue": i * 1000 }))
        .collect()
}

pub const TEST_TOKEN: &str = "test-access-token";

pub struct StaticTokens;

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn token(&self, _environment: &Environment) -> Result<AccessToken> {
        Ok(AccessToken::new(TEST_TOKEN, Some(3600)))
    }
}

pub struct RejectingTokens;

#[async_trait]
impl TokenProvider for RejectingTokens {
    async fn token(&self, _environment: &Environment) -> Result<AccessToken> {
        Err(Error::UpstreamAuth {
            status: 401,
            message: "AADSTS7000215: Invalid client secret provided.".to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub resource: String,
    pub prefer: Option<String>,
    pub token: String,
}

/// Serves entity-set lookups and paged data for configured entity sets.
/// `$top` and `$skip` in the resource are honoured.
#[derive(Default)]
pub struct FakeDataverse {
    entity_sets: HashMap<String, String>,
    data: HashMap<String, Vec<Value>>,
    metadata: Vec<(String, Value)>,
    failure: Option<(u16, String)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeDataverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(
        mut self,
        logical_name: &str,
        entity_set: &str,
        records: Vec<Value>,
    ) -> Self {
        self.entity_sets
            .insert(logical_name.to_string(), entity_set.to_string());
        self.data.insert(entity_set.to_string(), records);
        self
    }

    /// Canned response for any resource starting with `prefix`.
    pub fn with_metadata(mut self, prefix: &str, payload: Value) -> Self {
        self.metadata.push((prefix.to_string(), payload));
        self
    }

    /// Data requests fail with this status and OData error message.
    pub fn failing_data(mut self, status: u16, message: &str) -> Self {
        self.failure = Some((status, message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn entity_set_response(&self, resource: &str) -> Option<Value> {
        let logical_name = resource
            .strip_prefix("EntityDefinitions(LogicalName='")?
            .split('\'')
            .next()?;
        if !resource.contains("$select=EntitySetName") {
            return None;
        }
        let entity_set = self.entity_sets.get(logical_name)?;
        Some(json!({ "LogicalName": logical_name, "EntitySetName": entity_set }))
    }

    fn data_response(&self, resource: &str) -> Option<Result<Value>> {
        let (entity_set, query) = resource.split_once('?')?;
        let records = self.data.get(entity_set)?;

        if let Some((status, message)) = &self.failure {
            return Some(Err(Error::UpstreamQuery {
                status: *status,
                message: message.clone(),
                query: None,
            }));
        }

        let param = |name: &str| -> Option<usize> {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix(name))
                .and_then(|v| v.parse().ok())
        };
        let top = param("$top=").unwrap_or(records.len());
        let skip = param("$skip=").unwrap_or(0);
        let page: Vec<Value> = records.iter().skip(skip).take(top).cloned().collect();

        Some(Ok(json!({ "@odata.count": records.len(), "value": page })))
    }
}

#[async_trait]
impl DataverseApi for FakeDataverse {
    async fn get(
        &self,
        _environment: &Environment,
        token: &AccessToken,
        resource: &str,
        prefer: Option<&str>,
    ) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            resource: resource.to_string(),
            prefer: prefer.map(str::to_string),
            token: token.secret().to_string(),
        });

        if let Some(payload) = self.entity_set_response(resource) {
            return Ok(payload);
        }
        if let Some(result) = self.data_response(resource) {
            return result;
        }
        self.metadata
            .iter()
            .filter(|(prefix, _)| resource.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| Error::UpstreamQuery {
                status: 404,
                message: format!("Resource not found for the segment '{}'.", resource),
                query: None,
            })
    }
}

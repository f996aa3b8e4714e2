use common::{Error, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::DataverseApi;
use crate::models::{
    AccessToken, AttributeMetadata, EntityMetadata, Environment, ODataCollection, RawAttribute,
    RawEntity, RawLookupTargets, RawPicklist, RawRelationship, RelationshipMetadata,
    RelationshipType,
};

const ENTITY_SELECT: &str =
    "LogicalName,DisplayName,EntitySetName,PrimaryIdAttribute,PrimaryNameAttribute,Description,IsCustomEntity";
const ATTRIBUTE_SELECT: &str =
    "LogicalName,DisplayName,AttributeType,IsPrimaryId,IsPrimaryName,RequiredLevel,IsCustomAttribute,Description,AttributeOf";
const RELATIONSHIP_SELECT: &str =
    "SchemaName,ReferencingEntity,ReferencingAttribute,ReferencedEntity,ReferencedAttribute,ReferencingEntityNavigationPropertyName";

/// Attribute list for one entity, as returned by `describe_entities`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAttributes {
    pub logical_name: String,
    pub attributes: Vec<AttributeMetadata>,
}

/// Typed view over the metadata endpoints of the Web API.
#[derive(Clone)]
pub struct MetadataGateway {
    api: Arc<dyn DataverseApi>,
}

/// Logical names are interpolated into resource paths, so only plain
/// identifiers are accepted.
pub fn check_logical_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid logical name: '{}'", name)))
    }
}

fn definition_path(logical_name: &str) -> String {
    format!("EntityDefinitions(LogicalName='{}')", logical_name)
}

impl MetadataGateway {
    pub fn new(api: Arc<dyn DataverseApi>) -> Self {
        Self { api }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        environment: &Environment,
        token: &AccessToken,
        resource: &str,
    ) -> Result<T> {
        let payload: Value = self.api.get(environment, token, resource, None).await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Entities usable in Advanced Find, sorted by display name.
    pub async fn list_entities(
        &self,
        environment: &Environment,
        token: &AccessToken,
    ) -> Result<Vec<EntityMetadata>> {
        let resource = format!(
            "EntityDefinitions?$select={}&$filter=IsValidForAdvancedFind eq true",
            ENTITY_SELECT
        );
        let collection: ODataCollection<RawEntity> =
            self.fetch(environment, token, &resource).await?;

        let mut entities: Vec<EntityMetadata> =
            collection.value.into_iter().map(EntityMetadata::from).collect();
        entities.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));

        debug!(environment = %environment.id, count = entities.len(), "Listed entities");
        Ok(entities)
    }

    pub async fn entity(
        &self,
        environment: &Environment,
        token: &AccessToken,
        logical_name: &str,
    ) -> Result<EntityMetadata> {
        check_logical_name(logical_name)?;
        let resource = format!("{}?$select={}", definition_path(logical_name), ENTITY_SELECT);
        let raw: RawEntity = self.fetch(environment, token, &resource).await?;
        Ok(raw.into())
    }

    /// Collection name used in OData resource paths (`account` → `accounts`).
    pub async fn entity_set_name(
        &self,
        environment: &Environment,
        token: &AccessToken,
        logical_name: &str,
    ) -> Result<String> {
        check_logical_name(logical_name)?;
        let resource = format!("{}?$select=EntitySetName", definition_path(logical_name));
        let raw: RawEntity = self.fetch(environment, token, &resource).await?;

        raw.entity_set_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::NotFound(format!("entity '{}' has no entity set", logical_name))
            })
    }

    /// Readable attributes of an entity, enriched with lookup targets and
    /// choice options. The enrichment calls are best-effort.
    pub async fn attributes(
        &self,
        environment: &Environment,
        token: &AccessToken,
        logical_name: &str,
    ) -> Result<Vec<AttributeMetadata>> {
        check_logical_name(logical_name)?;
        let base = definition_path(logical_name);

        let resource = format!("{}/Attributes?$select={}", base, ATTRIBUTE_SELECT);
        let collection: ODataCollection<RawAttribute> =
            self.fetch(environment, token, &resource).await?;

        let mut attributes: Vec<AttributeMetadata> = collection
            .value
            .into_iter()
            .filter(|raw| !raw.is_helper_column())
            .map(AttributeMetadata::from)
            .collect();

        let lookups = format!(
            "{}/Attributes/Microsoft.Dynamics.CRM.LookupAttributeMetadata?$select=LogicalName,Targets",
            base
        );
        match self
            .fetch::<ODataCollection<RawLookupTargets>>(environment, token, &lookups)
            .await
        {
            Ok(collection) => {
                let targets: HashMap<String, Vec<String>> = collection
                    .value
                    .into_iter()
                    .map(|lookup| (lookup.logical_name, lookup.targets))
                    .collect();
                for attribute in attributes.iter_mut() {
                    if let Some(found) = targets.get(&attribute.logical_name) {
                        attribute.targets = Some(found.clone());
                    }
                }
            }
            Err(e) => warn!(entity = logical_name, error = %e, "Failed to fetch lookup targets"),
        }

        let picklists = format!(
            "{}/Attributes/Microsoft.Dynamics.CRM.PicklistAttributeMetadata?$select=LogicalName&$expand=OptionSet($select=Options)",
            base
        );
        match self
            .fetch::<ODataCollection<RawPicklist>>(environment, token, &picklists)
            .await
        {
            Ok(collection) => {
                let mut options: HashMap<String, _> = collection
                    .value
                    .into_iter()
                    .map(|picklist| (picklist.logical_name.clone(), picklist.into_options()))
                    .collect();
                for attribute in attributes.iter_mut() {
                    if let Some(found) = options.remove(&attribute.logical_name) {
                        attribute.options = Some(found);
                    }
                }
            }
            Err(e) => warn!(entity = logical_name, error = %e, "Failed to fetch choice options"),
        }

        attributes.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
        });
        Ok(attributes)
    }

    /// One-to-many followed by many-to-one relationships. Either side may be
    /// missing if its call fails; the failure is logged.
    pub async fn relationships(
        &self,
        environment: &Environment,
        token: &AccessToken,
        logical_name: &str,
    ) -> Result<Vec<RelationshipMetadata>> {
        check_logical_name(logical_name)?;
        let base = definition_path(logical_name);
        let mut relationships = Vec::new();

        for (segment, relationship_type) in [
            ("OneToManyRelationships", RelationshipType::OneToMany),
            ("ManyToOneRelationships", RelationshipType::ManyToOne),
        ] {
            let resource = format!("{}/{}?$select={}", base, segment, RELATIONSHIP_SELECT);
            match self
                .fetch::<ODataCollection<RawRelationship>>(environment, token, &resource)
                .await
            {
                Ok(collection) => relationships.extend(
                    collection
                        .value
                        .into_iter()
                        .map(|raw| raw.into_metadata(relationship_type)),
                ),
                Err(e) => warn!(
                    entity = logical_name,
                    segment,
                    error = %e,
                    "Failed to fetch relationships"
                ),
            }
        }

        Ok(relationships)
    }

    /// Attribute lists for several entities with at most `concurrency`
    /// requests in flight. Entities whose fetch fails are left out.
    pub async fn describe_entities(
        &self,
        environment: &Environment,
        token: &AccessToken,
        logical_names: &[String],
        concurrency: usize,
    ) -> Vec<EntityAttributes> {
        stream::iter(logical_names.iter().cloned())
            .map(|logical_name| async move {
                match self.attributes(environment, token, &logical_name).await {
                    Ok(attributes) => Some(EntityAttributes {
                        logical_name,
                        attributes,
                    }),
                    Err(e) => {
                        warn!(entity = %logical_name, error = %e, "Skipping entity description");
                        None
                    }
                }
            })
            .buffered(concurrency.max(1))
            .filter_map(|described| async move { described })
            .collect()
            .await
    }
}

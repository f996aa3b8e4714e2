use common::Result;
use dataverse::{
    AccessToken, AttributeMetadata, EntityAttributes, EntityMetadata, Environment,
    MetadataGateway, RelationshipMetadata, TokenProvider,
};
use std::sync::Arc;

use crate::store::EnvironmentStore;

/// Metadata browsing for the designer UI, scoped to the caller's
/// environments.
pub struct MetadataService {
    environments: Arc<dyn EnvironmentStore>,
    tokens: Arc<dyn TokenProvider>,
    gateway: MetadataGateway,
    concurrency: usize,
}

impl MetadataService {
    pub fn new(
        environments: Arc<dyn EnvironmentStore>,
        tokens: Arc<dyn TokenProvider>,
        gateway: MetadataGateway,
        concurrency: usize,
    ) -> Self {
        Self {
            environments,
            tokens,
            gateway,
            concurrency,
        }
    }

    async fn connect(
        &self,
        user_id: &str,
        environment_id: &str,
    ) -> Result<(Environment, AccessToken)> {
        let environment = self.environments.get_owned(user_id, environment_id).await?;
        let token = self.tokens.token(&environment).await?;
        Ok((environment, token))
    }

    pub async fn environments(&self, user_id: &str) -> Result<Vec<Environment>> {
        self.environments.list_for_user(user_id).await
    }

    pub async fn entities(
        &self,
        user_id: &str,
        environment_id: &str,
    ) -> Result<Vec<EntityMetadata>> {
        let (environment, token) = self.connect(user_id, environment_id).await?;
        self.gateway.list_entities(&environment, &token).await
    }

    pub async fn entity(
        &self,
        user_id: &str,
        environment_id: &str,
        logical_name: &str,
    ) -> Result<EntityMetadata> {
        let (environment, token) = self.connect(user_id, environment_id).await?;
        self.gateway.entity(&environment, &token, logical_name).await
    }

    pub async fn attributes(
        &self,
        user_id: &str,
        environment_id: &str,
        logical_name: &str,
    ) -> Result<Vec<AttributeMetadata>> {
        let (environment, token) = self.connect(user_id, environment_id).await?;
        self.gateway.attributes(&environment, &token, logical_name).await
    }

    pub async fn relationships(
        &self,
        user_id: &str,
        environment_id: &str,
        logical_name: &str,
    ) -> Result<Vec<RelationshipMetadata>> {
        let (environment, token) = self.connect(user_id, environment_id).await?;
        self.gateway.relationships(&environment, &token, logical_name).await
    }

    pub async fn describe(
        &self,
        user_id: &str,
        environment_id: &str,
        logical_names: &[String],
    ) -> Result<Vec<EntityAttributes>> {
        let (environment, token) = self.connect(user_id, environment_id).await?;
        Ok(self
            .gateway
            .describe_entities(&environment, &token, logical_names, self.concurrency)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEnvironmentStore;
    use crate::testing::{FakeDataverse, StaticTokens, environment};
    use common::Error;
    use serde_json::json;

    fn service(api: FakeDataverse) -> MetadataService {
        let environments = InMemoryEnvironmentStore::new();
        environments.insert(environment("env-1", "alice"));
        MetadataService::new(
            Arc::new(environments),
            Arc::new(StaticTokens),
            MetadataGateway::new(Arc::new(api)),
            4,
        )
    }

    #[tokio::test]
    async fn test_entity_scoped_to_owner() {
        let api = FakeDataverse::new().with_metadata(
            "EntityDefinitions(LogicalName='account')",
            json!({ "LogicalName": "account", "EntitySetName": "accounts",
                    "DisplayName": { "UserLocalizedLabel": { "Label": "Account" } } }),
        );
        let service = service(api);

        let entity = service.entity("alice", "env-1", "account").await.unwrap();
        assert_eq!(entity.display_name, "Account");
        assert_eq!(entity.entity_set_name, "accounts");

        assert!(matches!(
            service.entity("mallory", "env-1", "account").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_describe_skips_failures() {
        let api = FakeDataverse::new().with_metadata(
            "EntityDefinitions(LogicalName='account')/Attributes?",
            json!({ "value": [ { "LogicalName": "name", "AttributeType": "String" } ] }),
        );
        let described = service(api)
            .describe("alice", "env-1", &["account".to_string(), "nosuch".to_string()])
            .await
            .unwrap();

        assert_eq!(described.len(), 1);
        assert_eq!(described[0].logical_name, "account");
        assert_eq!(described[0].attributes[0].logical_name, "name");
    }
}

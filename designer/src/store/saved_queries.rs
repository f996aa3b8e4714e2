use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Error, Result};
use dashmap::DashMap;
use serde_json::value::RawValue;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::environments::EnvironmentStore;
use crate::models::{NewSavedQuery, SavedQuery, SavedQueryUpdate, parse_definition};

/// Persistence seam for saved queries. Ownership is enforced above this
/// layer, by `SavedQueryStore`.
#[async_trait]
pub trait SavedQueryRepository: Send + Sync {
    async fn insert(&self, query: SavedQuery) -> Result<()>;
    async fn find(&self, id: Uuid) -> Result<Option<SavedQuery>>;
    async fn list(&self, user_id: &str) -> Result<Vec<SavedQuery>>;
    async fn replace(&self, query: SavedQuery) -> Result<()>;
    async fn remove(&self, id: Uuid) -> Result<bool>;
}

/// Stored row: the definition is kept as the JSON text it was sent as.
#[derive(Clone)]
struct StoredQuery {
    id: Uuid,
    user_id: String,
    environment_id: String,
    name: String,
    description: Option<String>,
    definition: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredQuery {
    fn from_saved(query: &SavedQuery) -> Self {
        Self {
            id: query.id,
            user_id: query.user_id.clone(),
            environment_id: query.environment_id.clone(),
            name: query.name.clone(),
            description: query.description.clone(),
            definition: query.definition.get().to_string(),
            created_at: query.created_at,
            updated_at: query.updated_at,
        }
    }

    fn to_saved(&self) -> Result<SavedQuery> {
        let definition = RawValue::from_string(self.definition.clone())?;
        Ok(SavedQuery {
            id: self.id,
            user_id: self.user_id.clone(),
            environment_id: self.environment_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            definition,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Default)]
pub struct InMemorySavedQueryRepository {
    rows: DashMap<Uuid, StoredQuery>,
}

impl InMemorySavedQueryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn raw_definition(&self, id: Uuid) -> Option<String> {
        self.rows.get(&id).map(|row| row.definition.clone())
    }
}

#[async_trait]
impl SavedQueryRepository for InMemorySavedQueryRepository {
    async fn insert(&self, query: SavedQuery) -> Result<()> {
        let row = StoredQuery::from_saved(&query);
        self.rows.insert(row.id, row);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<SavedQuery>> {
        self.rows.get(&id).map(|row| row.to_saved()).transpose()
    }

    async fn list(&self, user_id: &str) -> Result<Vec<SavedQuery>> {
        self.rows
            .iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.to_saved())
            .collect()
    }

    async fn replace(&self, query: SavedQuery) -> Result<()> {
        let row = StoredQuery::from_saved(&query);
        match self.rows.get_mut(&row.id) {
            Some(mut existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(Error::NotFound(format!("saved query '{}'", query.id))),
        }
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        Ok(self.rows.remove(&id).is_some())
    }
}

/// CRUD over saved queries, scoped to the requesting user.
pub struct SavedQueryStore {
    repository: Arc<dyn SavedQueryRepository>,
    environments: Arc<dyn EnvironmentStore>,
}

fn not_found(id: Uuid) -> Error {
    Error::NotFound(format!("saved query '{}'", id))
}

fn checked_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("saved query name is required".to_string()));
    }
    Ok(name.to_string())
}

impl SavedQueryStore {
    pub fn new(
        repository: Arc<dyn SavedQueryRepository>,
        environments: Arc<dyn EnvironmentStore>,
    ) -> Self {
        Self {
            repository,
            environments,
        }
    }

    pub async fn create(&self, user_id: &str, new: NewSavedQuery) -> Result<SavedQuery> {
        let name = checked_name(&new.name)?;
        if parse_definition(&new.definition)?.environment_id != new.environment_id {
            return Err(Error::Validation(
                "definition belongs to a different environment".to_string(),
            ));
        }
        self.environments
            .get_owned(user_id, &new.environment_id)
            .await?;

        let now = Utc::now();
        let saved = SavedQuery {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            environment_id: new.environment_id,
            name,
            description: new.description,
            definition: new.definition,
            created_at: now,
            updated_at: now,
        };
        self.repository.insert(saved.clone()).await?;

        info!(id = %saved.id, environment = %saved.environment_id, "Saved query created");
        Ok(saved)
    }

    pub async fn get(&self, user_id: &str, id: Uuid) -> Result<SavedQuery> {
        self.repository
            .find(id)
            .await?
            .filter(|saved| saved.user_id == user_id)
            .ok_or_else(|| not_found(id))
    }

    /// Most recently updated first, optionally limited to one environment.
    pub async fn list(
        &self,
        user_id: &str,
        environment_id: Option<&str>,
    ) -> Result<Vec<SavedQuery>> {
        let mut saved: Vec<SavedQuery> = self
            .repository
            .list(user_id)
            .await?
            .into_iter()
            .filter(|query| environment_id.is_none_or(|env| query.environment_id == env))
            .collect();
        saved.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(saved)
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: Uuid,
        update: SavedQueryUpdate,
    ) -> Result<SavedQuery> {
        let mut saved = self.get(user_id, id).await?;

        if let Some(name) = update.name {
            saved.name = checked_name(&name)?;
        }
        if let Some(description) = update.description {
            saved.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(definition) = update.definition {
            if parse_definition(&definition)?.environment_id != saved.environment_id {
                return Err(Error::Validation(
                    "definition belongs to a different environment".to_string(),
                ));
            }
            saved.definition = definition;
        }
        saved.updated_at = Utc::now();

        self.repository.replace(saved.clone()).await?;
        Ok(saved)
    }

    pub async fn delete(&self, user_id: &str, id: Uuid) -> Result<()> {
        self.get(user_id, id).await?;
        if self.repository.remove(id).await? {
            info!(%id, "Saved query deleted");
            Ok(())
        } else {
            Err(not_found(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEnvironmentStore;
    use crate::testing::{account_query, definition_json, environment};

    fn store() -> (SavedQueryStore, Arc<InMemorySavedQueryRepository>) {
        let environments = InMemoryEnvironmentStore::new();
        environments.insert(environment("env-1", "alice"));
        environments.insert(environment("env-2", "bob"));
        let repository = Arc::new(InMemorySavedQueryRepository::new());
        (
            SavedQueryStore::new(repository.clone(), Arc::new(environments)),
            repository,
        )
    }

    fn new_query(environment_id: &str) -> NewSavedQuery {
        let text = serde_json::to_string(&account_query(environment_id)).unwrap();
        NewSavedQuery {
            environment_id: environment_id.to_string(),
            name: " Top accounts ".to_string(),
            description: Some("By revenue".to_string()),
            definition: definition_json(&text),
        }
    }

    #[tokio::test]
    async fn test_definition_round_trips_byte_identical() {
        let (store, repository) = store();
        let new = new_query("env-1");
        let original = new.definition.get().to_string();

        let created = store.create("alice", new).await.unwrap();
        assert_eq!(created.name, "Top accounts");
        assert_eq!(repository.raw_definition(created.id).unwrap(), original);

        let loaded = store.get("alice", created.id).await.unwrap();
        assert_eq!(loaded.definition.get(), original);
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.updated_at, created.updated_at);
        assert_eq!(loaded.query().unwrap(), account_query("env-1"));
    }

    #[tokio::test]
    async fn test_unmodelled_content_survives_save_and_load() {
        let (store, _) = store();
        let sent = r#"{"environmentId":"env-1","primaryEntity":"account","fields":[{"entityAlias":"main","fieldName":"name"}],"filters":[{"entityAlias":"main","fieldName":"revenue","operator":"between","value":[1,10],"logicalOperator":"and"}],"layout":{"columnWidths":[120,80]}}"#;

        let created = store
            .create(
                "alice",
                NewSavedQuery {
                    environment_id: "env-1".to_string(),
                    name: "Ranges".to_string(),
                    description: None,
                    definition: definition_json(sent),
                },
            )
            .await
            .unwrap();

        let loaded = store.get("alice", created.id).await.unwrap();
        assert_eq!(loaded.definition.get(), sent);
        let serialized = serde_json::to_value(&loaded).unwrap();
        assert_eq!(serialized["definition"]["filters"][0]["operator"], "between");
        assert_eq!(serialized["definition"]["layout"]["columnWidths"][1], 80);

        let updated = store
            .update(
                "alice",
                created.id,
                SavedQueryUpdate {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.definition.get(), sent);
    }

    #[tokio::test]
    async fn test_foreign_records_are_not_found() {
        let (store, _) = store();
        let created = store.create("alice", new_query("env-1")).await.unwrap();

        assert!(matches!(store.get("bob", created.id).await, Err(Error::NotFound(_))));
        assert!(matches!(
            store.update("bob", created.id, SavedQueryUpdate::default()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(store.delete("bob", created.id).await, Err(Error::NotFound(_))));
        assert!(store.list("bob", None).await.unwrap().is_empty());

        // Creating against someone else's environment fails the same way.
        assert!(matches!(
            store.create("alice", new_query("env-2")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let (store, _) = store();

        let mut blank = new_query("env-1");
        blank.name = "   ".to_string();
        assert!(matches!(store.create("alice", blank).await, Err(Error::Validation(_))));

        let mut mismatched = new_query("env-1");
        mismatched.definition =
            definition_json(&serde_json::to_string(&account_query("env-2")).unwrap());
        assert!(matches!(
            store.create("alice", mismatched).await,
            Err(Error::Validation(_))
        ));

        let mut shapeless = new_query("env-1");
        shapeless.definition = definition_json(r#"{"fields":[]}"#);
        assert!(matches!(store.create("alice", shapeless).await, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_update_list_and_delete() {
        let (store, _) = store();
        let first = store.create("alice", new_query("env-1")).await.unwrap();
        let second = store.create("alice", new_query("env-1")).await.unwrap();

        let mut definition = first.query().unwrap();
        definition.top = Some(10);
        let updated = store
            .update(
                "alice",
                first.id,
                SavedQueryUpdate {
                    name: Some("Renamed".to_string()),
                    description: Some(String::new()),
                    definition: Some(definition_json(
                        &serde_json::to_string(&definition).unwrap(),
                    )),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.description, None);
        assert_eq!(updated.query().unwrap().top, Some(10));
        assert!(updated.updated_at >= updated.created_at);

        let listed = store.list("alice", Some("env-1")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert!(store.list("alice", Some("env-9")).await.unwrap().is_empty());

        store.delete("alice", second.id).await.unwrap();
        assert!(matches!(store.get("alice", second.id).await, Err(Error::NotFound(_))));
        assert_eq!(store.list("alice", None).await.unwrap().len(), 1);
    }
}

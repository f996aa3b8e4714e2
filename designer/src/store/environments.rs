use async_trait::async_trait;
use common::config::EnvironmentConfig;
use common::{Error, Result};
use dashmap::DashMap;
use dataverse::Environment;

#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    /// The environment, provided `user_id` owns it. Missing and foreign
    /// environments are indistinguishable to the caller.
    async fn get_owned(&self, user_id: &str, environment_id: &str) -> Result<Environment>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Environment>>;
}

#[derive(Default)]
pub struct InMemoryEnvironmentStore {
    environments: DashMap<String, Environment>,
}

impl InMemoryEnvironmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(seed: &[EnvironmentConfig]) -> Self {
        let store = Self::new();
        for config in seed {
            store.insert(Environment::from(config));
        }
        store
    }

    pub fn insert(&self, environment: Environment) {
        self.environments.insert(environment.id.clone(), environment);
    }
}

#[async_trait]
impl EnvironmentStore for InMemoryEnvironmentStore {
    async fn get_owned(&self, user_id: &str, environment_id: &str) -> Result<Environment> {
        self.environments
            .get(environment_id)
            .filter(|environment| environment.user_id == user_id)
            .map(|environment| environment.value().clone())
            .ok_or_else(|| Error::NotFound(format!("environment '{}'", environment_id)))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Environment>> {
        let mut environments: Vec<Environment> = self
            .environments
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        environments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(environments)
    }
}

use common::config::EnvironmentConfig;
use serde::Serialize;

/// A Dataverse organisation a user has registered, together with the
/// app-registration credentials used for the client-credentials flow.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub org_url: String,
    pub tenant_id: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
}

impl Environment {
    /// Base URL of the Web API, without a trailing slash.
    pub fn api_base(&self, api_version: &str) -> String {
        format!(
            "{}/api/data/{}",
            self.org_url.trim_end_matches('/'),
            api_version
        )
    }
}

impl From<&EnvironmentConfig> for Environment {
    fn from(config: &EnvironmentConfig) -> Self {
        Self {
            id: config.id.clone(),
            user_id: config.user_id.clone(),
            name: config.name.clone(),
            org_url: config.org_url.clone(),
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("org_url", &self.org_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token for one environment.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    pub expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            secret: secret.into(),
            expires_in,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

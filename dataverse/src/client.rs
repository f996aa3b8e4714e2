use async_trait::async_trait;
use common::config::DataverseConfig;
use common::{Error, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::annotations::error_message;
use crate::models::{AccessToken, Environment};

/// Read access to an environment's Web API. `resource` is everything after
/// `/api/data/{version}/`, query string included.
#[async_trait]
pub trait DataverseApi: Send + Sync {
    async fn get(
        &self,
        environment: &Environment,
        token: &AccessToken,
        resource: &str,
        prefer: Option<&str>,
    ) -> Result<Value>;
}

/// Builds the shared HTTP client with explicit timeouts.
pub fn build_http_client(config: &DataverseConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()?;
    Ok(client)
}

pub struct DataverseClient {
    http: reqwest::Client,
    api_version: String,
}

impl DataverseClient {
    pub fn new(http: reqwest::Client, config: &DataverseConfig) -> Self {
        Self {
            http,
            api_version: config.api_version.clone(),
        }
    }

    pub fn resource_url(&self, environment: &Environment, resource: &str) -> String {
        format!(
            "{}/{}",
            environment.api_base(&self.api_version),
            resource.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl DataverseApi for DataverseClient {
    async fn get(
        &self,
        environment: &Environment,
        token: &AccessToken,
        resource: &str,
        prefer: Option<&str>,
    ) -> Result<Value> {
        let url = self.resource_url(environment, resource);
        debug!(environment = %environment.id, %url, "Dataverse GET");

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(token.secret())
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Accept", "application/json");

        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                environment = %environment.id,
                status = status.as_u16(),
                "Dataverse request failed"
            );
            return Err(Error::UpstreamQuery {
                status: status.as_u16(),
                message: error_message(&body),
                query: None,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

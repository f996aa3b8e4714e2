use async_trait::async_trait;
use common::config::DataverseConfig;
use common::{Error, Result};
use serde::Deserialize;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::models::{AccessToken, Environment};

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, environment: &Environment) -> Result<AccessToken>;
}

/// OAuth2 client-credentials exchange against the Microsoft identity
/// platform. Every call performs a fresh exchange.
pub struct ClientCredentialsProvider {
    http: reqwest::Client,
    authority_host: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ClientCredentialsProvider {
    pub fn new(http: reqwest::Client, config: &DataverseConfig) -> Self {
        Self {
            http,
            authority_host: config.authority_host.trim_end_matches('/').to_string(),
        }
    }

    pub fn token_endpoint(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, tenant_id)
    }
}

/// `{org_url}/.default`, the scope Dataverse expects for app-only tokens.
pub fn scope_for(environment: &Environment) -> String {
    format!("{}/.default", environment.org_url.trim_end_matches('/'))
}

pub(crate) fn token_request_body(environment: &Environment) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "client_credentials")
        .append_pair("client_id", &environment.client_id)
        .append_pair("client_secret", &environment.client_secret)
        .append_pair("scope", &scope_for(environment))
        .finish()
}

fn auth_error_message(body: &str) -> String {
    match serde_json::from_str::<TokenError>(body) {
        Ok(TokenError {
            error_description: Some(description),
            ..
        }) => description,
        Ok(TokenError {
            error: Some(code), ..
        }) => code,
        _ => "token endpoint returned an unreadable response".to_string(),
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn token(&self, environment: &Environment) -> Result<AccessToken> {
        let endpoint = self.token_endpoint(&environment.tenant_id);
        debug!(environment = %environment.id, "Requesting Dataverse access token");

        let response = self
            .http
            .post(&endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(token_request_body(environment))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = auth_error_message(&body);
            warn!(
                environment = %environment.id,
                status = status.as_u16(),
                "Client-credentials exchange rejected"
            );
            return Err(Error::UpstreamAuth {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|_| Error::UpstreamAuth {
            status: status.as_u16(),
            message: "token response did not contain an access_token".to_string(),
        })?;

        Ok(AccessToken::new(token.access_token, token.expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment() -> Environment {
        Environment {
            id: "env-1".into(),
            user_id: "user-1".into(),
            name: "Contoso".into(),
            org_url: "https://contoso.crm.dynamics.com/".into(),
            tenant_id: "72f988bf".into(),
            client_id: "app-id".into(),
            client_secret: "s3cr&t".into(),
        }
    }

    #[test]
    fn test_scope_and_request_body() {
        let env = environment();
        assert_eq!(scope_for(&env), "https://contoso.crm.dynamics.com/.default");

        let body = token_request_body(&env);
        assert!(body.starts_with("grant_type=client_credentials&client_id=app-id"));
        assert!(body.contains("client_secret=s3cr%26t"));
        assert!(body.contains("scope=https%3A%2F%2Fcontoso.crm.dynamics.com%2F.default"));
    }

    #[tokio::test]
    async fn test_token_endpoint() {
        let provider = ClientCredentialsProvider::new(
            reqwest::Client::new(),
            &DataverseConfig {
                authority_host: "https://login.microsoftonline.com/".into(),
                ..DataverseConfig::default()
            },
        );
        assert_eq!(
            provider.token_endpoint("72f988bf"),
            "https://login.microsoftonline.com/72f988bf/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_auth_error_message_prefers_description() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#;
        assert_eq!(
            auth_error_message(body),
            "AADSTS7000215: Invalid client secret provided."
        );
        assert_eq!(auth_error_message(r#"{"error":"invalid_client"}"#), "invalid_client");
        assert_eq!(
            auth_error_message("<html>"),
            "token endpoint returned an unreadable response"
        );
    }
}

use config::{Config, ConfigError, FileFormat};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dataverse: DataverseConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataverseConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_metadata_concurrency")]
    pub metadata_concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_rows")]
    pub max_rows: u32,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Seed entry for the environment store. The secret is only ever handed
/// to the token provider.
#[derive(Deserialize, Clone)]
pub struct EnvironmentConfig {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub org_url: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("org_url", &self.org_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_api_port(),
        }
    }
}

impl Default for DataverseConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            authority_host: default_authority_host(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            metadata_concurrency: default_metadata_concurrency(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_rows: default_export_rows(),
            sheet_name: default_sheet_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    3000
}

fn default_api_version() -> String {
    "v9.2".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_metadata_concurrency() -> usize {
    4
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    5000
}

fn default_export_rows() -> u32 {
    5000
}

fn default_sheet_name() -> String {
    "Query Results".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        Self::build(builder.build()?)
    }

    /// Builds settings from an inline TOML document, without environment
    /// overrides.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::from_str(document, FileFormat::Toml))
            .build()?;

        Self::build(config)
    }

    fn build(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;

        debug!(
            environments = settings.environments.len(),
            api_version = %settings.dataverse.api_version,
            "Parsed settings"
        );

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_document_is_empty() {
        let settings = Settings::from_toml_str("").unwrap();

        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.dataverse.api_version, "v9.2");
        assert_eq!(settings.export.max_rows, 5000);
        assert_eq!(settings.query.default_page_size, 50);
        assert!(settings.environments.is_empty());
    }

    #[test]
    fn test_environment_seed_and_overrides() {
        let settings = Settings::from_toml_str(
            r#"
            [server]
            port = 8080

            [export]
            max_rows = 1000

            [[environments]]
            id = "env-1"
            user_id = "user-1"
            name = "Contoso"
            org_url = "https://contoso.crm.dynamics.com"
            tenant_id = "tenant"
            client_id = "client"
            client_secret = "hunter2"
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.export.max_rows, 1000);
        assert_eq!(settings.export.sheet_name, "Query Results");
        assert_eq!(settings.environments.len(), 1);
        assert_eq!(settings.environments[0].org_url, "https://contoso.crm.dynamics.com");
    }

    #[test]
    fn test_environment_debug_redacts_secret() {
        let env = EnvironmentConfig {
            id: "env-1".into(),
            user_id: "user-1".into(),
            name: "Contoso".into(),
            org_url: "https://contoso.crm.dynamics.com".into(),
            tenant_id: "tenant".into(),
            client_id: "client".into(),
            client_secret: "hunter2".into(),
        };

        let rendered = format!("{:?}", env);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}

pub mod api;
pub mod export;
pub mod models;
pub mod odata;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use common::Result;
use common::config::{LoggingConfig, Settings};
use dataverse::{
    ClientCredentialsProvider, DataverseApi, DataverseClient, MetadataGateway, TokenProvider,
    build_http_client,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use export::SpreadsheetExporter;
use services::{MetadataService, QueryService};
use store::{
    EnvironmentStore, InMemoryEnvironmentStore, InMemorySavedQueryRepository, SavedQueryStore,
};

/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wires the services against live Dataverse. One HTTP client is shared by
/// the token provider and the OData client.
pub fn build_state(settings: &Settings) -> Result<AppState> {
    let http = build_http_client(&settings.dataverse)?;

    let environments: Arc<dyn EnvironmentStore> =
        Arc::new(InMemoryEnvironmentStore::from_config(&settings.environments));
    let tokens: Arc<dyn TokenProvider> =
        Arc::new(ClientCredentialsProvider::new(http.clone(), &settings.dataverse));
    let api: Arc<dyn DataverseApi> = Arc::new(DataverseClient::new(http, &settings.dataverse));

    let queries = Arc::new(QueryService::new(
        Arc::clone(&environments),
        Arc::clone(&tokens),
        Arc::clone(&api),
        settings.query.clone(),
    ));

    Ok(AppState {
        metadata: Arc::new(MetadataService::new(
            Arc::clone(&environments),
            tokens,
            MetadataGateway::new(api),
            settings.dataverse.metadata_concurrency,
        )),
        exporter: Arc::new(SpreadsheetExporter::new(
            Arc::clone(&queries),
            settings.export.clone(),
        )),
        queries,
        saved_queries: Arc::new(SavedQueryStore::new(
            Arc::new(InMemorySavedQueryRepository::new()),
            environments,
        )),
    })
}

/// Loads configuration and serves the designer API until shutdown.
pub async fn run_server(config_path: &str) -> Result<()> {
    let settings = Settings::new(config_path)?;
    init_tracing(&settings.logging);

    let state = build_state(&settings)?;
    info!(
        environments = settings.environments.len(),
        api_version = %settings.dataverse.api_version,
        "Query designer configured"
    );

    let api_router = api::routes(state);

    let listener = TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    info!(address = %listener.local_addr()?, "Query designer API listening");
    axum::serve(listener, api_router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_state_from_settings() {
        let settings = Settings::from_toml_str(
            r#"
            [export]
            max_rows = 250

            [[environments]]
            id = "env-1"
            user_id = "alice"
            name = "Contoso"
            org_url = "https://contoso.crm.dynamics.com"
            tenant_id = "tenant"
            client_id = "client"
            client_secret = "secret"
            "#,
        )
        .unwrap();

        let state = build_state(&settings).unwrap();
        let environments = state.metadata.environments("alice").await.unwrap();
        assert_eq!(environments.len(), 1);
        assert_eq!(state.queries.default_page_size(), 50);

        let mut query = testing::account_query("env-1");
        query.top = None;
        assert_eq!(state.exporter.row_limit(&query), 250);
    }
}

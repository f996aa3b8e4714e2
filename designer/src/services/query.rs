use common::Result;
use common::config::QueryConfig;
use dataverse::annotations;
use dataverse::{DataverseApi, MetadataGateway, TokenProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use super::validation::{validate_page, validate_query};
use crate::models::{QueryDefinition, QueryResult};
use crate::odata::{columns, compile, map_rows};
use crate::store::EnvironmentStore;

/// Runs designer queries: ownership check, token, entity-set lookup,
/// compile, one GET, row mapping. A single attempt per call.
pub struct QueryService {
    environments: Arc<dyn EnvironmentStore>,
    tokens: Arc<dyn TokenProvider>,
    api: Arc<dyn DataverseApi>,
    metadata: MetadataGateway,
    config: QueryConfig,
}

pub fn prefer_header(page_size: u32) -> String {
    format!(
        "odata.include-annotations=\"*\",odata.maxpagesize={}",
        page_size
    )
}

impl QueryService {
    pub fn new(
        environments: Arc<dyn EnvironmentStore>,
        tokens: Arc<dyn TokenProvider>,
        api: Arc<dyn DataverseApi>,
        config: QueryConfig,
    ) -> Self {
        Self {
            environments,
            tokens,
            metadata: MetadataGateway::new(Arc::clone(&api)),
            api,
            config,
        }
    }

    pub fn default_page_size(&self) -> u32 {
        self.config.default_page_size
    }

    pub async fn execute(
        &self,
        user_id: &str,
        query: &QueryDefinition,
        page: u32,
        page_size: u32,
        count_only: bool,
    ) -> Result<QueryResult> {
        self.execute_with_ceiling(
            user_id,
            query,
            page,
            page_size,
            count_only,
            self.config.max_page_size,
        )
        .await
    }

    /// As `execute`, with the page-size ceiling supplied by the caller.
    pub(crate) async fn execute_with_ceiling(
        &self,
        user_id: &str,
        query: &QueryDefinition,
        page: u32,
        page_size: u32,
        count_only: bool,
        max_page_size: u32,
    ) -> Result<QueryResult> {
        let started = Instant::now();
        validate_query(query)?;
        validate_page(page, page_size, max_page_size)?;

        let environment = self
            .environments
            .get_owned(user_id, &query.environment_id)
            .await?;
        let token = self.tokens.token(&environment).await?;
        let entity_set = self
            .metadata
            .entity_set_name(&environment, &token, &query.primary_entity)
            .await?;

        let compiled = compile(query, page, page_size, count_only);
        debug!(
            environment = %environment.id,
            entity_set = %entity_set,
            query = %compiled,
            "Compiled OData query"
        );

        let resource = format!("{}{}", entity_set, compiled);
        let payload = self
            .api
            .get(&environment, &token, &resource, Some(&prefer_header(page_size)))
            .await
            .map_err(|e| {
                let e = e.with_query(&compiled);
                error!(environment = %environment.id, error = %e, "Query execution failed");
                e
            })?;

        let records = annotations::records(&payload);
        let rows = map_rows(records, query);
        let execution_time = started.elapsed().as_millis() as u64;

        info!(
            environment = %environment.id,
            entity = %query.primary_entity,
            page,
            rows = rows.len(),
            elapsed_ms = execution_time,
            "Query executed"
        );

        Ok(QueryResult {
            columns: columns(query),
            has_more: records.len() == page_size as usize,
            total_count: annotations::total_count(&payload),
            rows,
            page,
            page_size,
            execution_time,
        })
    }
}

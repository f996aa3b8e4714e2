pub mod xlsx;

use common::Result;
use common::config::ExportConfig;
use std::sync::Arc;
use tracing::info;

use crate::models::QueryDefinition;
use crate::services::QueryService;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Runs a query once and packages the first `max_rows` results as a
/// workbook. Anything past the cap is dropped.
pub struct SpreadsheetExporter {
    queries: Arc<QueryService>,
    config: ExportConfig,
}

impl SpreadsheetExporter {
    pub fn new(queries: Arc<QueryService>, config: ExportConfig) -> Self {
        Self { queries, config }
    }

    /// Rows requested from Dataverse: the configured cap, or `top` when it
    /// is smaller.
    pub fn row_limit(&self, query: &QueryDefinition) -> u32 {
        match query.top {
            Some(top) if top > 0 => top.min(self.config.max_rows),
            _ => self.config.max_rows,
        }
    }

    pub async fn export(&self, user_id: &str, query: &QueryDefinition) -> Result<Vec<u8>> {
        let limit = self.row_limit(query);
        let result = self
            .queries
            .execute_with_ceiling(user_id, query, 1, limit, false, limit)
            .await?;

        let workbook = xlsx::write_workbook(&result, &self.config.sheet_name)?;
        info!(
            environment = %query.environment_id,
            rows = result.rows.len(),
            truncated = result.has_more,
            bytes = workbook.len(),
            "Exported query results"
        );
        Ok(workbook)
    }

    /// Download name, e.g. `account-export.xlsx`.
    pub fn file_name(query: &QueryDefinition) -> String {
        format!("{}-export.xlsx", query.primary_entity)
    }
}

use serde::{Deserialize, Serialize};

use crate::models::QueryDefinition;

// Request models
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueryRequest {
    pub query: QueryDefinition,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    #[serde(default)]
    pub count_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub query: QueryDefinition,
}

#[derive(Debug, Deserialize)]
pub struct DescribeRequest {
    pub entities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQueryParams {
    pub environment_id: Option<String>,
}

// Response models
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dataverse::{
    AttributeMetadata, EntityAttributes, EntityMetadata, Environment, RelationshipMetadata,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::extract::CurrentUser;
use super::models::{
    ApiResponse, DescribeRequest, ExecuteQueryRequest, ExportRequest, SavedQueryParams,
};
use crate::export::{SpreadsheetExporter, XLSX_CONTENT_TYPE};
use crate::models::{NewSavedQuery, QueryResult, SavedQuery, SavedQueryUpdate};
use crate::services::{AppError, MetadataService, QueryService};
use crate::store::SavedQueryStore;

#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<MetadataService>,
    pub queries: Arc<QueryService>,
    pub exporter: Arc<SpreadsheetExporter>,
    pub saved_queries: Arc<SavedQueryStore>,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub async fn list_environments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<Environment>> {
    let environments = state.metadata.environments(&user).await?;
    Ok(Json(ApiResponse::success(environments)))
}

pub async fn list_entities(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(environment_id): Path<String>,
) -> ApiResult<Vec<EntityMetadata>> {
    let entities = state.metadata.entities(&user, &environment_id).await?;
    Ok(Json(ApiResponse::success(entities)))
}

pub async fn get_entity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((environment_id, logical_name)): Path<(String, String)>,
) -> ApiResult<EntityMetadata> {
    let entity = state
        .metadata
        .entity(&user, &environment_id, &logical_name)
        .await?;
    Ok(Json(ApiResponse::success(entity)))
}

pub async fn list_attributes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((environment_id, logical_name)): Path<(String, String)>,
) -> ApiResult<Vec<AttributeMetadata>> {
    let attributes = state
        .metadata
        .attributes(&user, &environment_id, &logical_name)
        .await?;
    Ok(Json(ApiResponse::success(attributes)))
}

pub async fn list_relationships(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((environment_id, logical_name)): Path<(String, String)>,
) -> ApiResult<Vec<RelationshipMetadata>> {
    let relationships = state
        .metadata
        .relationships(&user, &environment_id, &logical_name)
        .await?;
    Ok(Json(ApiResponse::success(relationships)))
}

pub async fn describe_entities(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(environment_id): Path<String>,
    Json(request): Json<DescribeRequest>,
) -> ApiResult<Vec<EntityAttributes>> {
    if request.entities.is_empty() {
        return Err(AppError::bad_request("entities must not be empty".into()));
    }
    let described = state
        .metadata
        .describe(&user, &environment_id, &request.entities)
        .await?;
    Ok(Json(ApiResponse::success(described)))
}

pub async fn execute_query(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ExecuteQueryRequest>,
) -> ApiResult<QueryResult> {
    let page = request.page.unwrap_or(1);
    let page_size = request
        .page_size
        .unwrap_or_else(|| state.queries.default_page_size());

    let result = state
        .queries
        .execute(&user, &request.query, page, page_size, request.count_only)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

pub async fn export_query(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ExportRequest>,
) -> Result<Response, AppError> {
    let workbook = state.exporter.export(&user, &request.query).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        SpreadsheetExporter::file_name(&request.query)
    );

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        workbook,
    )
        .into_response())
}

pub async fn list_saved_queries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SavedQueryParams>,
) -> ApiResult<Vec<SavedQuery>> {
    let saved = state
        .saved_queries
        .list(&user, params.environment_id.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

pub async fn create_saved_query(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(new): Json<NewSavedQuery>,
) -> ApiResult<SavedQuery> {
    let saved = state.saved_queries.create(&user, new).await?;
    Ok(Json(ApiResponse::success(saved)))
}

pub async fn get_saved_query(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<SavedQuery> {
    let saved = state.saved_queries.get(&user, id).await?;
    Ok(Json(ApiResponse::success(saved)))
}

pub async fn update_saved_query(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(update): Json<SavedQueryUpdate>,
) -> ApiResult<SavedQuery> {
    let saved = state.saved_queries.update(&user, id, update).await?;
    Ok(Json(ApiResponse::success(saved)))
}

pub async fn delete_saved_query(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.saved_queries.delete(&user, id).await?;
    Ok(Json(ApiResponse::success(())))
}

// Define all API routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/environments", get(list_environments))
        .route("/api/environments/{id}/entities", get(list_entities))
        .route("/api/environments/{id}/entities/{name}", get(get_entity))
        .route(
            "/api/environments/{id}/entities/{name}/attributes",
            get(list_attributes),
        )
        .route(
            "/api/environments/{id}/entities/{name}/relationships",
            get(list_relationships),
        )
        .route(
            "/api/environments/{id}/metadata/describe",
            post(describe_entities),
        )
        .route("/api/query/execute", post(execute_query))
        .route("/api/query/export", post(export_query))
        .route(
            "/api/saved-queries",
            get(list_saved_queries).post(create_saved_query),
        )
        .route(
            "/api/saved-queries/{id}",
            get(get_saved_query)
                .put(update_saved_query)
                .delete(delete_saved_query),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

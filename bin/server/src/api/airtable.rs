//! Airtable schema browsing for the form builder.

use std::sync::Arc;

use airform_integration::FieldSchema;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::auth::{AppState, RequireSession};
use crate::error::ApiError;

/// A base as shown to the form builder.
#[derive(Debug, Serialize)]
pub struct BaseSummary {
    pub id: String,
    pub name: String,
}

/// A table and its fields.
#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub id: String,
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablesQuery {
    base_id: Option<String>,
}

/// `GET /api/v1/airtable/bases`
pub async fn list_bases(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
) -> Result<Json<Vec<BaseSummary>>, ApiError> {
    let token = state.guard.access_token(session.user_id).await?;
    let bases = state.airtable.list_bases(&token).await?;
    Ok(Json(
        bases
            .into_iter()
            .map(|b| BaseSummary {
                id: b.id,
                name: b.name,
            })
            .collect(),
    ))
}

/// `GET /api/v1/airtable/tables?baseId=`
pub async fn list_tables(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Query(query): Query<TablesQuery>,
) -> Result<Json<Vec<TableSummary>>, ApiError> {
    let base_id = query
        .base_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("baseId is required"))?;

    let token = state.guard.access_token(session.user_id).await?;
    let tables = state.airtable.list_tables(&token, &base_id).await?;
    Ok(Json(
        tables
            .into_iter()
            .map(|t| TableSummary {
                id: t.id,
                name: t.name,
                fields: t.fields,
            })
            .collect(),
    ))
}

/// `GET /api/v1/airtable/fields/{baseId}/{tableId}`
///
/// Only fields that map onto a question type are returned.
pub async fn list_fields(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Path((base_id, table_id)): Path<(String, String)>,
) -> Result<Json<Vec<FieldSchema>>, ApiError> {
    let token = state.guard.access_token(session.user_id).await?;
    let table = state
        .airtable
        .find_table(&token, &base_id, &table_id)
        .await?
        .ok_or(ApiError::NotFound { what: "Table" })?;
    Ok(Json(table.supported_fields().cloned().collect()))
}

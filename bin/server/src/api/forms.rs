//! Form builder routes. Every route is scoped to the signed-in owner.

use std::collections::HashSet;
use std::sync::Arc;

use airform_core::{FormId, UserId};
use airform_integration::Question;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;

use super::Envelope;
use crate::auth::{AppState, RequireSession};
use crate::db::FormRecord;
use crate::db::forms::UNTITLED_FORM;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateForm {
    airtable_base_id: Option<String>,
    airtable_table_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateForm {
    title: Option<String>,
    questions: Option<Vec<Question>>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_questions(questions: &[Question]) -> Result<(), ApiError> {
    let mut keys = HashSet::new();
    for question in questions {
        if question.question_key.trim().is_empty() {
            return Err(ApiError::bad_request("questionKey must not be empty"));
        }
        if question.airtable_field_id.trim().is_empty() {
            return Err(ApiError::bad_request("airtableFieldId must not be empty"));
        }
        if !keys.insert(question.question_key.as_str()) {
            return Err(ApiError::bad_request(format!(
                "duplicate questionKey '{}'",
                question.question_key
            )));
        }
    }
    Ok(())
}

/// Looks up the table name for a default title. Metadata failures fall
/// through to `None`.
async fn table_name(
    state: &AppState,
    token: &str,
    base_id: &str,
    table_id: &str,
) -> Option<String> {
    match state.airtable.find_table(token, base_id, table_id).await {
        Ok(table) => table.map(|t| t.name),
        Err(e) => {
            tracing::warn!(error = %e, "table name lookup failed");
            None
        }
    }
}

async fn owned_form(
    state: &AppState,
    id: FormId,
    owner_id: UserId,
) -> Result<FormRecord, ApiError> {
    state
        .forms
        .find(id)
        .await?
        .filter(|form| form.is_owned_by(owner_id))
        .ok_or(ApiError::NotFound { what: "Form" })
}

/// `POST /api/v1/form`
#[tracing::instrument(skip_all, fields(user_id = %session.user_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    payload: Result<Json<CreateForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<FormRecord>>), ApiError> {
    let Json(request) = payload?;
    let (Some(base_id), Some(table_id)) = (
        non_blank(request.airtable_base_id),
        non_blank(request.airtable_table_id),
    ) else {
        return Err(ApiError::bad_request("Base ID and Table ID are required"));
    };
    check_questions(&request.questions)?;

    let title = match non_blank(request.title) {
        Some(title) => title,
        None => {
            let token = state.guard.access_token(session.user_id).await?;
            table_name(&state, &token, &base_id, &table_id)
                .await
                .unwrap_or_else(|| UNTITLED_FORM.to_string())
        }
    };

    let form = FormRecord::new(session.user_id, base_id, table_id, title, request.questions);
    state.forms.insert(&form).await?;
    tracing::info!(form_id = %form.id, "form created");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(form).with_message("Form created successfully")),
    ))
}

/// `GET /api/v1/form`
pub async fn list(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
) -> Result<Json<Envelope<Vec<FormRecord>>>, ApiError> {
    let forms = state.forms.list_for_owner(session.user_id).await?;
    Ok(Json(Envelope::list(forms)))
}

/// `GET /api/v1/form/{id}`
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Path(id): Path<FormId>,
) -> Result<Json<Envelope<FormRecord>>, ApiError> {
    let form = owned_form(&state, id, session.user_id).await?;
    Ok(Json(Envelope::data(form)))
}

/// `PUT /api/v1/form/{id}`
#[tracing::instrument(skip_all, fields(user_id = %session.user_id, form_id = %id))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Path(id): Path<FormId>,
    payload: Result<Json<UpdateForm>, JsonRejection>,
) -> Result<Json<Envelope<FormRecord>>, ApiError> {
    let Json(request) = payload?;
    if let Some(questions) = &request.questions {
        check_questions(questions)?;
    }

    let mut form = owned_form(&state, id, session.user_id).await?;
    form.revise(non_blank(request.title), request.questions);
    if !state.forms.update(&form).await? {
        return Err(ApiError::NotFound { what: "Form" });
    }

    Ok(Json(
        Envelope::data(form).with_message("Form updated successfully"),
    ))
}

/// `DELETE /api/v1/form/{id}`
#[tracing::instrument(skip_all, fields(user_id = %session.user_id, form_id = %id))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Path(id): Path<FormId>,
) -> Result<Json<Envelope<()>>, ApiError> {
    if !state.forms.delete(id, session.user_id).await? {
        return Err(ApiError::NotFound { what: "Form" });
    }
    tracing::info!("form deleted");
    Ok(Json(Envelope::message("Form deleted permanently")))
}

//! Form submissions and their mirrored Airtable records.
//!
//! A submission is written to Airtable first and stored locally only once
//! the record exists. Reads and edits are limited to the form owner, and
//! every Airtable call uses the owner's token.

use std::sync::Arc;

use airform_core::{FormId, ResponseId, UserId};
use airform_integration::{RecordRemoval, RecordUpdate, record_fields};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;

use super::Envelope;
use crate::auth::{AppState, RequireSession};
use crate::db::{FormRecord, ResponseRecord};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    form_id: Option<FormId>,
    answers: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateResponse {
    answers: Option<Value>,
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

/// Loads a response together with its form, hiding responses of forms the
/// caller does not own.
async fn owned_response(
    state: &AppState,
    id: ResponseId,
    owner_id: UserId,
) -> Result<(ResponseRecord, FormRecord), ApiError> {
    let response = state
        .responses
        .find(id)
        .await?
        .ok_or(ApiError::NotFound { what: "Response" })?;
    let form = state
        .forms
        .find(response.form_id)
        .await?
        .filter(|form| form.is_owned_by(owner_id))
        .ok_or(ApiError::NotFound { what: "Response" })?;
    Ok((response, form))
}

/// `POST /api/v1/response`
///
/// Public: anyone holding a form id may submit.
#[tracing::instrument(skip_all)]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitResponse>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<ResponseRecord>>), ApiError> {
    let Json(request) = payload?;
    let (Some(form_id), Some(answers)) = (request.form_id, request.answers) else {
        return Err(ApiError::bad_request("formId and answers are required"));
    };

    let form = state
        .forms
        .find(form_id)
        .await?
        .ok_or(ApiError::NotFound { what: "Form" })?;
    let fields = record_fields(&form.questions, &answers)?;

    let token = state.guard.access_token(form.owner_id).await?;
    let record = state
        .airtable
        .create_record(&token, &form.airtable_base_id, &form.airtable_table_id, fields)
        .await?;

    let response = ResponseRecord::new(form.id, record.id, answers);
    state.responses.insert(&response).await?;
    tracing::info!(form_id = %form.id, response_id = %response.id, "response recorded");

    Ok((StatusCode::CREATED, Json(Envelope::data(response))))
}

/// `GET /api/v1/response/form/{formId}`
pub async fn list_for_form(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Path(form_id): Path<FormId>,
) -> Result<Json<Envelope<Vec<ResponseRecord>>>, ApiError> {
    let form = owned_form(&state, form_id, session.user_id).await?;
    let responses = state.responses.list_for_form(form.id).await?;
    Ok(Json(Envelope::list(responses)))
}

/// `GET /api/v1/response/{id}`
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Path(id): Path<ResponseId>,
) -> Result<Json<Envelope<ResponseRecord>>, ApiError> {
    let (response, _) = owned_response(&state, id, session.user_id).await?;
    Ok(Json(Envelope::data(response)))
}

/// `PUT /api/v1/response/{id}`
///
/// Patches the Airtable record, then the local copy. A record that is gone
/// upstream marks the response instead of failing.
#[tracing::instrument(skip_all, fields(response_id = %id))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Path(id): Path<ResponseId>,
    payload: Result<Json<UpdateResponse>, JsonRejection>,
) -> Result<Json<Envelope<ResponseRecord>>, ApiError> {
    let Json(request) = payload?;
    let answers = request
        .answers
        .ok_or_else(|| ApiError::bad_request("answers are required"))?;

    let (mut response, form) = owned_response(&state, id, session.user_id).await?;
    let fields = record_fields(&form.questions, &answers)?;

    if let Some(record_id) = response.live_record_id() {
        let token = state.guard.access_token(form.owner_id).await?;
        let outcome = state
            .airtable
            .update_record(
                &token,
                &form.airtable_base_id,
                &form.airtable_table_id,
                record_id,
                fields,
            )
            .await?;
        if outcome == RecordUpdate::Missing {
            response.mark_deleted_in_airtable();
        }
    }

    response.set_answers(answers);
    state.responses.update(&response).await?;
    Ok(Json(Envelope::data(response)))
}

/// `DELETE /api/v1/response/{id}`
#[tracing::instrument(skip_all, fields(response_id = %id))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    session: RequireSession,
    Path(id): Path<ResponseId>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let (response, form) = owned_response(&state, id, session.user_id).await?;

    if let Some(record_id) = response.live_record_id() {
        let token = state.guard.access_token(form.owner_id).await?;
        let outcome = state
            .airtable
            .delete_record(&token, &form.airtable_base_id, &form.airtable_table_id, record_id)
            .await?;
        if outcome == RecordRemoval::AlreadyGone {
            tracing::info!("record was already deleted in Airtable");
        }
    }

    if !state.responses.delete(response.id).await? {
        return Err(ApiError::NotFound { what: "Response" });
    }
    Ok(Json(Envelope::message("Response deleted successfully")))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use crate::test_support::TestApp;

    fn questions() -> Value {
        json!([
            {
                "questionKey": "name",
                "airtableFieldId": "fldName",
                "label": "Name",
                "type": "singleLineText",
                "required": true
            },
            {
                "questionKey": "reason",
                "airtableFieldId": "fldReason",
                "label": "Reason",
                "type": "longText",
                "required": true,
                "conditionalRules": {
                    "logic": "OR",
                    "conditions": [
                        {"questionKey": "role", "operator": "equals", "value": "other"}
                    ]
                }
            },
            {
                "questionKey": "role",
                "airtableFieldId": "fldRole",
                "label": "Role",
                "type": "singleSelect"
            }
        ])
    }

    async fn mount_create(app: &TestApp, expected_fields: Value, record_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v0/appA/tblA"))
            .and(header("authorization", "Bearer T1"))
            .and(body_json(json!({ "fields": expected_fields })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": record_id,
                "createdTime": "2026-01-01T00:00:00.000Z",
                "fields": {}
            })))
            .expect(1)
            .mount(&app.provider)
            .await;
    }

    async fn submitted(app: &TestApp, form_id: &str, answers: Value) -> (StatusCode, Value) {
        app.send(
            "POST",
            "/api/v1/response",
            None,
            Some(json!({"formId": form_id, "answers": answers})),
        )
        .await
    }

    #[tokio::test]
    async fn submission_creates_record_then_response() {
        let app = TestApp::start().await;
        let (_, owner) = app.signed_in("usrAlice", "T1").await;
        let form_id = app.create_form(&owner, questions()).await;
        mount_create(&app, json!({"fldName": "Ada", "fldRole": "engineer"}), "rec1").await;

        let (status, body) = submitted(
            &app,
            &form_id,
            json!({"name": "Ada", "role": "engineer", "reason": "hidden answer"}),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["airtableRecordId"], "rec1");
        assert_eq!(body["data"]["deletedInAirtable"], false);
        assert_eq!(app.responses.len(), 1);
    }

    #[tokio::test]
    async fn visible_required_question_must_be_answered() {
        let app = TestApp::start().await;
        let (_, owner) = app.signed_in("usrAlice", "T1").await;
        let form_id = app.create_form(&owner, questions()).await;

        let (status, body) =
            submitted(&app, &form_id, json!({"name": "Ada", "role": "other"})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_submission");
        assert_eq!(app.responses.len(), 0);
    }

    #[tokio::test]
    async fn provider_failure_stores_nothing() {
        let app = TestApp::start().await;
        let (_, owner) = app.signed_in("usrAlice", "T1").await;
        let form_id = app.create_form(&owner, questions()).await;
        Mock::given(method("POST"))
            .and(path("/v0/appA/tblA"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "error": {"type": "INVALID_VALUE_FOR_COLUMN"}
            })))
            .mount(&app.provider)
            .await;

        let (status, _) = submitted(&app, &form_id, json!({"name": "Ada"})).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(app.responses.len(), 0);
    }

    async fn mount_refresh(app: &TestApp, response: ResponseTemplate, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth2/v1/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-T1"))
            .respond_with(response)
            .expect(expected)
            .mount(&app.provider)
            .await;
    }

    #[tokio::test]
    async fn expired_owner_token_is_refreshed_once_before_submitting() {
        let app = TestApp::start().await;
        let (_, owner) = app.signed_in_expired("usrAlice", "T1").await;
        let form_id = app.create_form(&owner, questions()).await;
        mount_refresh(
            &app,
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "T2",
                "refresh_token": "R2",
                "expires_in": 3600
            })),
            1,
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/v0/appA/tblA"))
            .and(header("authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "rec1",
                "createdTime": "2026-01-01T00:00:00.000Z",
                "fields": {}
            })))
            .expect(2)
            .mount(&app.provider)
            .await;

        for _ in 0..2 {
            let (status, body) = submitted(&app, &form_id, json!({"name": "Ada"})).await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
        }

        let identity = app.identities.all().pop().expect("identity");
        assert_eq!(identity.access_token(), "T2");
        assert_eq!(identity.refresh_token(), Some("R2"));
        assert_eq!(app.responses.len(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_rejects_submission_and_stores_nothing() {
        let app = TestApp::start().await;
        let (_, owner) = app.signed_in_expired("usrAlice", "T1").await;
        let form_id = app.create_form(&owner, questions()).await;
        mount_refresh(
            &app,
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            1,
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/v0/appA/tblA"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&app.provider)
            .await;

        let (status, body) = submitted(&app, &form_id, json!({"name": "Ada"})).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "token_refresh_failed");
        assert_eq!(app.responses.len(), 0);
    }

    #[tokio::test]
    async fn submission_requires_form_and_answers() {
        let app = TestApp::start().await;
        let (status, _) = app
            .send("POST", "/api/v1/response", None, Some(json!({"answers": {}})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = submitted(&app, "form_01JAAAAAAAAAAAAAAAAAAAAAAA", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn owner_reads_and_others_do_not() {
        let app = TestApp::start().await;
        let (_, owner) = app.signed_in("usrAlice", "T1").await;
        let (_, other) = app.signed_in("usrBob", "T2").await;
        let form_id = app.create_form(&owner, questions()).await;
        mount_create(&app, json!({"fldName": "Ada"}), "rec1").await;
        let (_, created) = submitted(&app, &form_id, json!({"name": "Ada"})).await;
        let response_id = created["data"]["id"].as_str().expect("id").to_string();

        let (status, body) = app
            .get(&format!("/api/v1/response/form/{form_id}"), Some(&owner))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let (status, _) = app
            .get(&format!("/api/v1/response/form/{form_id}"), Some(&other))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/v1/response/{response_id}");
        let (status, body) = app.get(&uri, Some(&owner)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["answers"]["name"], "Ada");
        let (status, _) = app.get(&uri, Some(&other)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.get(&uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_patches_record_and_marks_missing_ones() {
        let app = TestApp::start().await;
        let (_, owner) = app.signed_in("usrAlice", "T1").await;
        let form_id = app.create_form(&owner, questions()).await;
        mount_create(&app, json!({"fldName": "Ada"}), "rec1").await;
        let (_, created) = submitted(&app, &form_id, json!({"name": "Ada"})).await;
        let uri = format!("/api/v1/response/{}", created["data"]["id"].as_str().expect("id"));

        Mock::given(method("PATCH"))
            .and(path("/v0/appA/tblA/rec1"))
            .and(body_json(json!({"fields": {"fldName": "Grace"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "rec1",
                "fields": {"fldName": "Grace"}
            })))
            .up_to_n_times(1)
            .mount(&app.provider)
            .await;
        let (status, body) = app
            .send("PUT", &uri, Some(&owner), Some(json!({"answers": {"name": "Grace"}})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["answers"]["name"], "Grace");
        assert_eq!(body["data"]["deletedInAirtable"], false);

        Mock::given(method("PATCH"))
            .and(path("/v0/appA/tblA/rec1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&app.provider)
            .await;
        let (status, body) = app
            .send("PUT", &uri, Some(&owner), Some(json!({"answers": {"name": "Linus"}})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["answers"]["name"], "Linus");
        assert_eq!(body["data"]["deletedInAirtable"], true);
    }

    #[tokio::test]
    async fn delete_tolerates_records_already_gone() {
        let app = TestApp::start().await;
        let (_, owner) = app.signed_in("usrAlice", "T1").await;
        let form_id = app.create_form(&owner, questions()).await;
        mount_create(&app, json!({"fldName": "Ada"}), "rec1").await;
        let (_, created) = submitted(&app, &form_id, json!({"name": "Ada"})).await;
        let uri = format!("/api/v1/response/{}", created["data"]["id"].as_str().expect("id"));

        Mock::given(method("DELETE"))
            .and(path("/v0/appA/tblA/rec1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&app.provider)
            .await;

        let (status, body) = app.send("DELETE", &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Response deleted successfully");
        assert_eq!(app.responses.len(), 0);
    }
}

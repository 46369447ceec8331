//! JSON API routes under `/api/v1` and the webhook receiver.
//!
//! Metadata and form routes act for the signed-in identity. Response
//! routes act for the identity that owns the form, so a public submission
//! writes to Airtable with the owner's token.

pub mod airtable;
pub mod forms;
pub mod responses;
pub mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::auth::AppState;

/// Success envelope for form and response routes.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            count: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        Self {
            count: Some(data.len()),
            ..Self::data(data)
        }
    }
}

impl Envelope<()> {
    pub fn message(message: &'static str) -> Self {
        Self {
            success: true,
            message: Some(message),
            count: None,
            data: None,
        }
    }
}

/// Routes mounted under `/api/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/airtable/bases", get(airtable::list_bases))
        .route("/airtable/tables", get(airtable::list_tables))
        .route("/airtable/fields/{base_id}/{table_id}", get(airtable::list_fields))
        .route("/form", get(forms::list).post(forms::create))
        .route(
            "/form/{id}",
            get(forms::get_one).put(forms::update).delete(forms::delete),
        )
        .route("/response", post(responses::submit))
        .route("/response/form/{form_id}", get(responses::list_for_form))
        .route(
            "/response/{id}",
            get(responses::get_one)
                .put(responses::update)
                .delete(responses::delete),
        )
}

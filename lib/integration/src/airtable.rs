//! Airtable Web API client.
//!
//! Every call takes the bearer token explicitly. Callers obtain it from the
//! token refresh guard so that an expired token is never sent.

use std::collections::HashSet;
use std::time::Duration;

use airform_core::Result;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::error::AirtableError;
use crate::form::FieldType;

/// A base the token can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_level: Option<String>,
}

/// A field in a table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl FieldSchema {
    /// Returns the question type that can fill this field, if any.
    #[must_use]
    pub fn question_type(&self) -> Option<FieldType> {
        FieldType::from_airtable(&self.field_type)
    }
}

/// A table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_field_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl Table {
    /// Fields a form question can be bound to.
    pub fn supported_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.question_type().is_some())
    }
}

/// A table record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Outcome of patching a record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordUpdate {
    Updated(Record),
    /// The record no longer exists upstream.
    Missing,
}

/// Outcome of deleting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRemoval {
    Deleted,
    /// The record was already gone.
    AlreadyGone,
}

#[derive(Deserialize)]
struct BasesPage {
    bases: Vec<Base>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Deserialize)]
struct TablesPage {
    tables: Vec<Table>,
}

/// Client for the Airtable Web API.
#[derive(Debug, Clone)]
pub struct AirtableClient {
    http: Client,
    base_url: Url,
}

impl AirtableClient {
    /// Creates a client for `base_url` (for example `https://api.airtable.com`).
    ///
    /// # Errors
    ///
    /// Returns [`AirtableError::ClientSetup`] if the URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AirtableError> {
        let base_url = Url::parse(base_url).map_err(|e| AirtableError::ClientSetup {
            details: format!("invalid base URL {base_url}: {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AirtableError::ClientSetup {
                details: format!("{base_url} cannot be a base URL"),
            }
            .into());
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AirtableError::ClientSetup {
                details: e.to_string(),
            })?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("v0").extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url, access_token: &str) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(access_token)
    }

    /// Lists every base the token can access, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an [`AirtableError`] if any page request fails.
    #[instrument(skip_all)]
    pub async fn list_bases(&self, access_token: &str) -> Result<Vec<Base>, AirtableError> {
        const OP: &str = "list bases";
        let mut bases = Vec::new();
        let mut offset: Option<String> = None;
        let mut seen_offsets = HashSet::new();
        loop {
            let mut request =
                self.request(Method::GET, self.endpoint(&["meta", "bases"]), access_token);
            if let Some(offset) = &offset {
                request = request.query(&[("offset", offset)]);
            }
            let response = send(OP, request).await?;
            let page: BasesPage = decode(OP, expect_success(OP, response).await?).await?;
            bases.extend(page.bases);
            match page.offset {
                Some(next) if !seen_offsets.insert(next.clone()) => {
                    return Err(AirtableError::RepeatedOffset {
                        operation: OP,
                        offset: next,
                    }
                    .into());
                }
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        debug!(count = bases.len(), "listed bases");
        Ok(bases)
    }

    /// Lists the tables of a base with their field schemas.
    ///
    /// # Errors
    ///
    /// Returns an [`AirtableError`] if the request fails.
    #[instrument(skip(self, access_token))]
    pub async fn list_tables(
        &self,
        access_token: &str,
        base_id: &str,
    ) -> Result<Vec<Table>, AirtableError> {
        const OP: &str = "list tables";
        let url = self.endpoint(&["meta", "bases", base_id, "tables"]);
        let response = send(OP, self.request(Method::GET, url, access_token)).await?;
        let page: TablesPage = decode(OP, expect_success(OP, response).await?).await?;
        Ok(page.tables)
    }

    /// Looks up one table of a base. Returns `None` if the base has no
    /// table with that id.
    ///
    /// # Errors
    ///
    /// Returns an [`AirtableError`] if the request fails.
    pub async fn find_table(
        &self,
        access_token: &str,
        base_id: &str,
        table_id: &str,
    ) -> Result<Option<Table>, AirtableError> {
        let tables = self.list_tables(access_token, base_id).await?;
        Ok(tables.into_iter().find(|t| t.id == table_id))
    }

    /// Creates a record and returns it with its new id.
    ///
    /// # Errors
    ///
    /// Returns an [`AirtableError`] if Airtable rejects the record or the
    /// request fails.
    #[instrument(skip(self, access_token, fields))]
    pub async fn create_record(
        &self,
        access_token: &str,
        base_id: &str,
        table_id: &str,
        fields: Map<String, Value>,
    ) -> Result<Record, AirtableError> {
        const OP: &str = "create record";
        let request = self
            .request(Method::POST, self.endpoint(&[base_id, table_id]), access_token)
            .json(&json!({ "fields": fields }));
        let response = send(OP, request).await?;
        let record: Record = decode(OP, expect_success(OP, response).await?).await?;
        debug!(record_id = %record.id, "created record");
        Ok(record)
    }

    /// Patches the given fields of a record.
    ///
    /// # Errors
    ///
    /// Returns an [`AirtableError`] if the request fails for any reason
    /// other than the record being gone.
    #[instrument(skip(self, access_token, fields))]
    pub async fn update_record(
        &self,
        access_token: &str,
        base_id: &str,
        table_id: &str,
        record_id: &str,
        fields: Map<String, Value>,
    ) -> Result<RecordUpdate, AirtableError> {
        const OP: &str = "update record";
        let request = self
            .request(
                Method::PATCH,
                self.endpoint(&[base_id, table_id, record_id]),
                access_token,
            )
            .json(&json!({ "fields": fields }));
        let response = send(OP, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!("record missing upstream");
            return Ok(RecordUpdate::Missing);
        }
        let record = decode(OP, expect_success(OP, response).await?).await?;
        Ok(RecordUpdate::Updated(record))
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns an [`AirtableError`] if the request fails for any reason
    /// other than the record being gone.
    #[instrument(skip(self, access_token))]
    pub async fn delete_record(
        &self,
        access_token: &str,
        base_id: &str,
        table_id: &str,
        record_id: &str,
    ) -> Result<RecordRemoval, AirtableError> {
        const OP: &str = "delete record";
        let request = self.request(
            Method::DELETE,
            self.endpoint(&[base_id, table_id, record_id]),
            access_token,
        );
        let response = send(OP, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!("record already deleted upstream");
            return Ok(RecordRemoval::AlreadyGone);
        }
        expect_success(OP, response).await?;
        Ok(RecordRemoval::Deleted)
    }
}

async fn send(operation: &'static str, request: RequestBuilder) -> Result<Response, AirtableError> {
    let response = request.send().await.map_err(|e| AirtableError::Request {
        operation,
        details: e.to_string(),
    })?;
    Ok(response)
}

async fn expect_success(
    operation: &'static str,
    response: Response,
) -> Result<Response, AirtableError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AirtableError::Status {
        operation,
        status: status.as_u16(),
        body,
    }
    .into())
}

async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, AirtableError> {
    let value = response.json::<T>().await.map_err(|e| AirtableError::Decode {
        operation,
        details: e.to_string(),
    })?;
    Ok(value)
}

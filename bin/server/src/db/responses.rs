//! Form responses and their PostgreSQL repository.

use std::str::FromStr;

use airform_core::{FormId, ResponseId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use super::{ResponseStore, StoreError, decode_error};

/// A submitted response and the Airtable record it was mirrored to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub id: ResponseId,
    pub form_id: FormId,
    pub airtable_record_id: Option<String>,
    pub answers: Value,
    /// Set once the mirrored record turns out to be gone upstream.
    pub deleted_in_airtable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResponseRecord {
    /// Creates a response already mirrored to `airtable_record_id`.
    #[must_use]
    pub fn new(form_id: FormId, airtable_record_id: String, answers: Value) -> Self {
        let now = Utc::now();
        Self {
            id: ResponseId::new(),
            form_id,
            airtable_record_id: Some(airtable_record_id),
            answers,
            deleted_in_airtable: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the stored answers.
    pub fn set_answers(&mut self, answers: Value) {
        self.answers = answers;
        self.updated_at = Utc::now();
    }

    /// Records that the mirrored record no longer exists upstream.
    pub fn mark_deleted_in_airtable(&mut self) {
        self.deleted_in_airtable = true;
        self.updated_at = Utc::now();
    }

    /// Returns the record id while the upstream record is believed to exist.
    #[must_use]
    pub fn live_record_id(&self) -> Option<&str> {
        if self.deleted_in_airtable {
            None
        } else {
            self.airtable_record_id.as_deref()
        }
    }
}

/// Row type for response queries.
#[derive(FromRow)]
struct ResponseRow {
    id: String,
    form_id: String,
    airtable_record_id: Option<String>,
    answers: Value,
    deleted_in_airtable: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResponseRow {
    fn try_into_record(self) -> Result<ResponseRecord, sqlx::Error> {
        let id = ResponseId::from_str(&self.id)
            .map_err(|e| decode_error("response id", &self.id, e))?;
        let form_id =
            FormId::from_str(&self.form_id).map_err(|e| decode_error("form id", &self.form_id, e))?;
        Ok(ResponseRecord {
            id,
            form_id,
            airtable_record_id: self.airtable_record_id,
            answers: self.answers,
            deleted_in_airtable: self.deleted_in_airtable,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// PostgreSQL-backed [`ResponseStore`].
#[derive(Clone)]
pub struct PgResponseStore {
    pool: PgPool,
}

impl PgResponseStore {
    /// Creates a new response repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResponseStore for PgResponseStore {
    async fn insert(&self, response: &ResponseRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO responses (id, form_id, airtable_record_id, answers, deleted_in_airtable, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(response.id.to_string())
        .bind(response.form_id.to_string())
        .bind(response.airtable_record_id.as_deref())
        .bind(&response.answers)
        .bind(response.deleted_in_airtable)
        .bind(response.created_at)
        .bind(response.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: ResponseId) -> Result<Option<ResponseRecord>, StoreError> {
        let row: Option<ResponseRow> = sqlx::query_as(
            r#"
            SELECT id, form_id, airtable_record_id, answers, deleted_in_airtable, created_at, updated_at
            FROM responses
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ResponseRow::try_into_record).transpose()?)
    }

    async fn list_for_form(&self, form_id: FormId) -> Result<Vec<ResponseRecord>, StoreError> {
        let rows: Vec<ResponseRow> = sqlx::query_as(
            r#"
            SELECT id, form_id, airtable_record_id, answers, deleted_in_airtable, created_at, updated_at
            FROM responses
            WHERE form_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(form_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(ResponseRow::try_into_record)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update(&self, response: &ResponseRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE responses
            SET airtable_record_id = $2, answers = $3, deleted_in_airtable = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(response.id.to_string())
        .bind(response.airtable_record_id.as_deref())
        .bind(&response.answers)
        .bind(response.deleted_in_airtable)
        .bind(response.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: ResponseId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM responses
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

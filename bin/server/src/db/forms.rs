//! Form records and their PostgreSQL repository.

use std::str::FromStr;

use airform_core::{FormId, UserId};
use airform_integration::Question;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use super::{FormStore, StoreError, decode_error};

/// Title used when neither the request nor Airtable supplies one.
pub const UNTITLED_FORM: &str = "Untitled Form";

/// A form definition bound to one Airtable table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRecord {
    pub id: FormId,
    pub owner_id: UserId,
    pub airtable_base_id: String,
    pub airtable_table_id: String,
    pub title: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormRecord {
    /// Creates a new form owned by `owner_id`.
    #[must_use]
    pub fn new(
        owner_id: UserId,
        airtable_base_id: String,
        airtable_table_id: String,
        title: String,
        questions: Vec<Question>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: FormId::new(),
            owner_id,
            airtable_base_id,
            airtable_table_id,
            title,
            questions,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if `user_id` owns this form.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// Replaces the editable parts of the form.
    pub fn revise(&mut self, title: Option<String>, questions: Option<Vec<Question>>) {
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(questions) = questions {
            self.questions = questions;
        }
        self.updated_at = Utc::now();
    }
}

/// Row type for form queries.
#[derive(FromRow)]
struct FormRow {
    id: String,
    owner_id: String,
    airtable_base_id: String,
    airtable_table_id: String,
    title: String,
    questions: Json<Vec<Question>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FormRow {
    fn try_into_record(self) -> Result<FormRecord, sqlx::Error> {
        let id = FormId::from_str(&self.id).map_err(|e| decode_error("form id", &self.id, e))?;
        let owner_id = UserId::from_str(&self.owner_id)
            .map_err(|e| decode_error("owner id", &self.owner_id, e))?;
        Ok(FormRecord {
            id,
            owner_id,
            airtable_base_id: self.airtable_base_id,
            airtable_table_id: self.airtable_table_id,
            title: self.title,
            questions: self.questions.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// PostgreSQL-backed [`FormStore`].
#[derive(Clone)]
pub struct PgFormStore {
    pool: PgPool,
}

impl PgFormStore {
    /// Creates a new form repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FormStore for PgFormStore {
    async fn insert(&self, form: &FormRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO forms (id, owner_id, airtable_base_id, airtable_table_id, title, questions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(form.id.to_string())
        .bind(form.owner_id.to_string())
        .bind(&form.airtable_base_id)
        .bind(&form.airtable_table_id)
        .bind(&form.title)
        .bind(Json(&form.questions))
        .bind(form.created_at)
        .bind(form.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: FormId) -> Result<Option<FormRecord>, StoreError> {
        let row: Option<FormRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, airtable_base_id, airtable_table_id, title, questions, created_at, updated_at
            FROM forms
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FormRow::try_into_record).transpose()?)
    }

    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<FormRecord>, StoreError> {
        let rows: Vec<FormRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, airtable_base_id, airtable_table_id, title, questions, created_at, updated_at
            FROM forms
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(FormRow::try_into_record)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update(&self, form: &FormRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE forms
            SET title = $3, questions = $4, updated_at = $5
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(form.id.to_string())
        .bind(form.owner_id.to_string())
        .bind(&form.title)
        .bind(Json(&form.questions))
        .bind(form.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: FormId, owner_id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM forms
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

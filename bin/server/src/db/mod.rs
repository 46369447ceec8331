//! Database repositories for forms and responses.
//!
//! Handlers talk to the [`FormStore`] and [`ResponseStore`] traits; the
//! PostgreSQL implementations live in [`forms`] and [`responses`].

pub mod forms;
#[cfg(test)]
pub mod memory;
pub mod responses;

use std::fmt;

use airform_core::{FormId, ResponseId, UserId};
use async_trait::async_trait;

pub use forms::{FormRecord, PgFormStore};
pub use responses::{PgResponseStore, ResponseRecord};

/// Errors from any store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database rejected or failed the query.
    Database { details: String },
    /// A stored row could not be turned back into a record.
    Corrupt { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Corrupt { details } => write!(f, "corrupt stored row: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Decode(inner) => Self::Corrupt {
                details: inner.to_string(),
            },
            other => Self::Database {
                details: other.to_string(),
            },
        }
    }
}

/// Maps an id parse failure on a stored row to a decode error.
pub(crate) fn decode_error(column: &str, value: &str, reason: impl fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {column} '{value}': {reason}"),
    )))
}

/// Storage for forms.
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Inserts a new form.
    async fn insert(&self, form: &FormRecord) -> Result<(), StoreError>;

    /// Finds a form by id, regardless of owner.
    async fn find(&self, id: FormId) -> Result<Option<FormRecord>, StoreError>;

    /// Lists an owner's forms, newest first.
    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<FormRecord>, StoreError>;

    /// Replaces title and questions. Returns false if the owner has no such form.
    async fn update(&self, form: &FormRecord) -> Result<bool, StoreError>;

    /// Deletes a form and its responses. Returns false if the owner has no such form.
    async fn delete(&self, id: FormId, owner_id: UserId) -> Result<bool, StoreError>;
}

/// Storage for form responses.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Inserts a new response.
    async fn insert(&self, response: &ResponseRecord) -> Result<(), StoreError>;

    /// Finds a response by id.
    async fn find(&self, id: ResponseId) -> Result<Option<ResponseRecord>, StoreError>;

    /// Lists the responses of a form, oldest first.
    async fn list_for_form(&self, form_id: FormId) -> Result<Vec<ResponseRecord>, StoreError>;

    /// Saves answers, record id and the upstream-deleted flag.
    async fn update(&self, response: &ResponseRecord) -> Result<(), StoreError>;

    /// Deletes a response. Returns false if it did not exist.
    async fn delete(&self, id: ResponseId) -> Result<bool, StoreError>;
}

//! Airtable integration for airform.
//!
//! This crate provides:
//!
//! - **Records client**: typed access to the Airtable Web API for schema
//!   metadata and record create/update/delete (`airtable`)
//! - **Form model**: questions mapped onto table fields, conditional
//!   visibility, and answer-to-field mapping (`form`)
//! - **Webhook verification**: HMAC-SHA256 signature checks (`webhook`)

pub mod airtable;
pub mod error;
pub mod form;
pub mod webhook;

pub use airtable::{AirtableClient, Base, FieldSchema, Record, RecordRemoval, RecordUpdate, Table};
pub use error::{AirtableError, SubmissionError, WebhookError};
pub use form::{Condition, ConditionalRules, FieldType, Logic, Operator, Question, record_fields};
pub use webhook::{SIGNATURE_HEADER, verify_signature};

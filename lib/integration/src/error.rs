//! Error types for the integration crate.
//!
//! - `AirtableError`: failures talking to the Airtable Web API
//! - `SubmissionError`: answers that do not satisfy a form
//! - `WebhookError`: rejected webhook deliveries

use std::fmt;

/// Errors from Airtable Web API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AirtableError {
    /// The HTTP client could not be built.
    ClientSetup { details: String },
    /// The request never produced a response (connect failure, timeout).
    Request { operation: &'static str, details: String },
    /// Airtable answered with a non-success status.
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    /// The response body did not have the expected shape.
    Decode { operation: &'static str, details: String },
    /// A paginated listing handed back an offset it had already returned.
    RepeatedOffset { operation: &'static str, offset: String },
}

impl fmt::Display for AirtableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientSetup { details } => {
                write!(f, "failed to build Airtable HTTP client: {details}")
            }
            Self::Request { operation, details } => {
                write!(f, "Airtable {operation} request failed: {details}")
            }
            Self::Status {
                operation,
                status,
                body,
            } => {
                write!(f, "Airtable {operation} returned HTTP {status}: {body}")
            }
            Self::Decode { operation, details } => {
                write!(f, "unexpected Airtable {operation} response: {details}")
            }
            Self::RepeatedOffset { operation, offset } => {
                write!(f, "Airtable {operation} repeated page offset '{offset}'")
            }
        }
    }
}

impl std::error::Error for AirtableError {}

/// Answers rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// A visible required question has no answer.
    MissingRequired { question_key: String },
    /// The answers payload is not a JSON object.
    NotAnObject,
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired { question_key } => {
                write!(f, "required question '{question_key}' was not answered")
            }
            Self::NotAnObject => write!(f, "answers must be a JSON object"),
        }
    }
}

impl std::error::Error for SubmissionError {}

/// Reasons a webhook delivery is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// No signature header was sent.
    MissingSignature,
    /// The signature header is not valid base64.
    MalformedSignature,
    /// The signature does not match the body.
    SignatureMismatch,
    /// The secret cannot key the MAC.
    InvalidKey,
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSignature => write!(f, "webhook signature header missing"),
            Self::MalformedSignature => write!(f, "webhook signature is not base64"),
            Self::SignatureMismatch => write!(f, "webhook signature mismatch"),
            Self::InvalidKey => write!(f, "webhook secret cannot key HMAC-SHA256"),
        }
    }
}

impl std::error::Error for WebhookError {}

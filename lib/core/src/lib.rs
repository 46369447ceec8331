//! Core domain types and utilities for airform.
//!
//! This crate provides the identifier types and the error-handling
//! foundation shared by the platform-access, integration, and server crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{FormId, ParseIdError, ResponseId, UserId};

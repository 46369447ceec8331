//! airform server.
//!
//! An axum service that signs people in with Airtable (OAuth2 with PKCE),
//! keeps their provider tokens fresh, and mirrors form submissions into
//! Airtable tables.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

#[cfg(test)]
mod test_support;

//! Shared `Result` alias.
//!
//! Library operations that cross an I/O boundary return their domain error
//! wrapped in a rootcause `Report`, e.g. `Result<Record, AirtableError>`.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

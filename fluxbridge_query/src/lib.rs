#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self
)]

//! The read path: rendering filter queries and reconstructing frames from
//! raw results.
//!
//! [`QueryFilter`] models range, tag-equality, and aggregation reads and
//! renders them to the store's SQL-like dialect. [`reconstruct`] inverts a
//! raw result set back into a [`fluxbridge_frame::Frame`], and [`unstack`]
//! pivots narrow name/value result shapes into wide per-name columns.

use thiserror::Error;

pub mod filter;
pub mod reconstruct;
pub mod response;

pub use filter::{
    AggregateFunction, Aggregation, DEFAULT_LAST_POINT_LOOKBACK, QueryFilter, first_last_summary,
    show_field_keys, show_measurements, show_tag_keys,
};
pub use reconstruct::{reconstruct, unstack};
pub use response::{QueryResponse, Series, StatementResult};

/// Errors for the read path
#[derive(Debug, Error)]
pub enum Error {
    /// A window or lookback string could not be parsed as a duration
    #[error("invalid duration '{input}': {source}")]
    InvalidDuration {
        /// The rejected input
        input: String,
        /// The parser failure
        #[source]
        source: humantime::DurationError,
    },

    /// A timezone name is not in the tz database
    #[error("unknown timezone: {zone}")]
    UnknownTimezone {
        /// The rejected zone name
        zone: String,
    },

    /// The store rejected the statement
    #[error("store returned an error: {message}")]
    Store {
        /// The store's error text
        message: String,
    },

    /// A time cell in the raw result could not be parsed
    #[error("invalid timestamp in result: {value}")]
    InvalidTimestamp {
        /// The rejected cell, rendered as JSON
        value: String,
    },

    /// An underlying frame error
    #[error(transparent)]
    Frame(#[from] fluxbridge_frame::Error),
}

/// A specialized `Result` for read-path errors
pub type Result<T, E = Error> = std::result::Result<T, E>;

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self
)]

//! The write path: turning tabular frames into tagged point batches.
//!
//! Three pieces:
//!
//! - the [`Point`] model, the atomic unit handed to the store;
//! - the [converter](convert), which maps a frame's rows to points after
//!   classifying each column as a tag, a field, or ignored;
//! - the [partitioner](partition), which splits heterogeneous rows into
//!   homogeneous tag-combination groups so each write carries one tag set.

use thiserror::Error;

pub mod convert;
pub mod partition;
pub mod point;
pub mod preset;

pub use convert::{ColumnRole, ConvertOptions, WRITE_MARKER_COLUMN, classify_columns, convert};
pub use partition::{TagGroup, partition};
pub use point::{Point, PointBuilder};
pub use preset::TagPreset;

/// Errors for the write path
#[derive(Debug, Error)]
pub enum Error {
    /// A point was constructed without any fields
    #[error("point for measurement '{measurement}' has no fields")]
    EmptyFields {
        /// The measurement the point was destined for
        measurement: String,
    },

    /// A key was used as both a tag and a field on one point
    #[error("key '{key}' is both a tag and a field on measurement '{measurement}'")]
    TagFieldCollision {
        /// The measurement the point was destined for
        measurement: String,
        /// The colliding key
        key: String,
    },

    /// A cell could not be coerced to a numeric field value.
    ///
    /// Raised per row; the converter skips the offending row rather than
    /// aborting the batch.
    #[error("cannot coerce column '{column}' at row {row} to a field value")]
    FieldCoercion {
        /// The field column holding the bad value
        column: String,
        /// The offending row offset
        row: usize,
    },

    /// A declared tag column does not exist in the frame
    #[error("tag column not found: {column}")]
    TagColumnNotFound {
        /// The missing column name
        column: String,
    },

    /// An underlying frame error
    #[error(transparent)]
    Frame(#[from] fluxbridge_frame::Error),
}

/// A specialized `Result` for write-path errors
pub type Result<T, E = Error> = std::result::Result<T, E>;

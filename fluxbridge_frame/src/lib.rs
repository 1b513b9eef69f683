#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self
)]

//! An ordered, column-oriented tabular frame.
//!
//! A [`Frame`] is a mutable collection of equal-length named columns plus a
//! row index, either positional or time-valued. It is the in-memory shape
//! that gets converted into tagged point batches on the write path and
//! reconstructed from raw query results on the read path.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use thiserror::Error;

pub mod column;

pub use column::{ColumnData, Scalar};

/// Errors for frame construction and access
#[derive(Debug, Error)]
pub enum Error {
    /// Two columns were declared with the same name
    #[error("duplicate column: {column}")]
    DuplicateColumn {
        /// The offending column name
        column: String,
    },

    /// A column's length differs from the rest of the frame
    #[error("column {column} has {actual} rows, expected {expected}")]
    ColumnLengthMismatch {
        /// The offending column name
        column: String,
        /// Rows in the rest of the frame
        expected: usize,
        /// Rows in the offending column
        actual: usize,
    },

    /// The time index length differs from the column length
    #[error("time index has {actual} entries, expected {expected}")]
    IndexLengthMismatch {
        /// Rows in the frame's columns
        expected: usize,
        /// Entries in the index
        actual: usize,
    },

    /// A named column does not exist in the frame
    #[error("column not found: {column}")]
    ColumnNotFound {
        /// The requested column name
        column: String,
    },
}

/// A specialized `Result` for [`Frame`] errors
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The row index of a [`Frame`]
#[derive(Debug, Clone, PartialEq)]
pub enum FrameIndex {
    /// Positional index: rows are addressed by offset only
    Rows,
    /// Time index: one instant per row.
    ///
    /// Entries carry a fixed offset so that timezone conversion can change
    /// the presentation without touching the underlying instants.
    Time(Vec<DateTime<FixedOffset>>),
}

impl FrameIndex {
    fn take(&self, rows: &[usize]) -> Self {
        match self {
            Self::Rows => Self::Rows,
            Self::Time(times) => Self::Time(
                rows.iter()
                    .filter_map(|r| times.get(*r).copied())
                    .collect(),
            ),
        }
    }
}

/// An ordered collection of equal-length named columns plus a row index
#[derive(Debug, Clone)]
pub struct Frame {
    /// Column name to data, in insertion order
    columns: IndexMap<String, ColumnData>,
    index: FrameIndex,
    row_count: usize,
}

impl Frame {
    /// Create a builder to incrementally construct a `Frame`
    pub fn builder() -> FrameBuilder {
        FrameBuilder::default()
    }

    /// A frame with no columns and no rows
    pub fn empty() -> Self {
        Self {
            columns: IndexMap::new(),
            index: FrameIndex::Rows,
            row_count: 0,
        }
    }

    /// The number of rows
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Whether the frame holds no rows
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// The row index
    pub fn index(&self) -> &FrameIndex {
        &self.index
    }

    /// The index instant for `row`, when the frame is time-indexed
    pub fn time_at(&self, row: usize) -> Option<DateTime<FixedOffset>> {
        match &self.index {
            FrameIndex::Rows => None,
            FrameIndex::Time(times) => times.get(row).copied(),
        }
    }

    /// Iterate columns as `(name, data)` in frame order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnData)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Column names in frame order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// The data for the named column
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.get(name)
    }

    /// Whether the named column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// The cell value at (`row`, `name`)
    pub fn value(&self, row: usize, name: &str) -> Option<Scalar> {
        self.columns.get(name).and_then(|c| c.value(row))
    }

    /// Insert or overwrite a column holding `value` in every row.
    ///
    /// Used to apply cross-cutting constant tags before conversion. An
    /// existing column keeps its position; a new one is appended.
    pub fn set_constant_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.columns
            .insert(name.into(), ColumnData::constant_text(value, self.row_count));
    }

    /// A frame holding only the named columns, keeping the index
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut columns = IndexMap::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let data = self
                .columns
                .get(name)
                .ok_or_else(|| Error::ColumnNotFound {
                    column: name.to_owned(),
                })?;
            columns.insert(name.to_owned(), data.clone());
        }
        Ok(Self {
            columns,
            index: self.index.clone(),
            row_count: self.row_count,
        })
    }

    /// A frame holding the rows of `self` selected by `rows`, in the given
    /// order. Out-of-bounds indices are dropped.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        let rows: Vec<usize> = rows.iter().copied().filter(|r| *r < self.row_count).collect();
        let columns = self
            .columns
            .iter()
            .map(|(n, c)| (n.clone(), c.take(&rows)))
            .collect();
        Self {
            columns,
            index: self.index.take(&rows),
            row_count: rows.len(),
        }
    }

    /// Convert a time index to the given timezone.
    ///
    /// Presentation only: offsets change, the underlying instants do not.
    /// A positionally-indexed frame is returned unchanged.
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        if let FrameIndex::Time(times) = &mut self.index {
            for t in times.iter_mut() {
                *t = t.with_timezone(&tz).fixed_offset();
            }
        }
        self
    }
}

/// Equality up to column order: same index, same set of identical columns.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.row_count == other.row_count
            && self.index == other.index
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .all(|(name, data)| other.columns.get(name) == Some(data))
    }
}

/// Incrementally constructs a [`Frame`].
///
/// Create this via `Frame::builder`.
#[derive(Debug, Default)]
pub struct FrameBuilder {
    columns: Vec<(String, ColumnData)>,
    index: Option<Vec<DateTime<FixedOffset>>>,
}

impl FrameBuilder {
    /// Add a column. Order of calls is the column order of the frame.
    pub fn column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.push((name.into(), data));
        self
    }

    /// Index the frame by UTC instants
    pub fn time_index<I>(self, times: I) -> Self
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        self.time_index_fixed(times.into_iter().map(|t| t.fixed_offset()))
    }

    /// Index the frame by instants carrying an explicit offset
    pub fn time_index_fixed<I>(mut self, times: I) -> Self
    where
        I: IntoIterator<Item = DateTime<FixedOffset>>,
    {
        self.index = Some(times.into_iter().collect());
        self
    }

    /// Validate lengths and uniqueness and produce the frame
    pub fn build(self) -> Result<Frame> {
        let row_count = self
            .columns
            .first()
            .map(|(_, c)| c.len())
            .or_else(|| self.index.as_ref().map(Vec::len))
            .unwrap_or(0);

        let mut columns = IndexMap::with_capacity(self.columns.len());
        for (name, data) in self.columns {
            if data.len() != row_count {
                return Err(Error::ColumnLengthMismatch {
                    column: name,
                    expected: row_count,
                    actual: data.len(),
                });
            }
            if columns.insert(name.clone(), data).is_some() {
                return Err(Error::DuplicateColumn { column: name });
            }
        }

        let index = match self.index {
            Some(times) => {
                if times.len() != row_count {
                    return Err(Error::IndexLengthMismatch {
                        expected: row_count,
                        actual: times.len(),
                    });
                }
                FrameIndex::Time(times)
            }
            None => FrameIndex::Rows,
        };

        Ok(Frame {
            columns,
            index,
            row_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample() -> Frame {
        Frame::builder()
            .column("power", ColumnData::Float(vec![1.0, 2.0, 3.0]))
            .column("unit", ColumnData::Text(vec!["a".into(), "b".into(), "a".into()]))
            .time_index([ts(0), ts(60), ts(120)])
            .build()
            .unwrap()
    }

    #[test]
    fn builder_checks_column_lengths() {
        let err = Frame::builder()
            .column("a", ColumnData::Float(vec![1.0, 2.0]))
            .column("b", ColumnData::Integer(vec![1]))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ColumnLengthMismatch { .. }));
    }

    #[test]
    fn builder_rejects_duplicate_columns() {
        let err = Frame::builder()
            .column("a", ColumnData::Float(vec![1.0]))
            .column("a", ColumnData::Float(vec![2.0]))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn { .. }));
    }

    #[test]
    fn builder_checks_index_length() {
        let err = Frame::builder()
            .column("a", ColumnData::Float(vec![1.0, 2.0]))
            .time_index([ts(0)])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::IndexLengthMismatch { .. }));
    }

    #[test]
    fn take_rows_keeps_index_alignment() {
        let frame = sample();
        let sub = frame.take_rows(&[2, 0]);
        assert_eq!(sub.row_count(), 2);
        assert_eq!(sub.value(0, "power"), Some(Scalar::Float(3.0)));
        assert_eq!(sub.time_at(0), Some(ts(120).fixed_offset()));
        assert_eq!(sub.time_at(1), Some(ts(0).fixed_offset()));
    }

    #[test]
    fn select_columns_unknown_name_errors() {
        let err = sample().select_columns(&["power", "missing"]).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));
    }

    #[test]
    fn constant_column_overwrites_in_place() {
        let mut frame = sample();
        frame.set_constant_text("unit", "c");
        frame.set_constant_text("model", "Base");
        assert_eq!(
            frame.column_names().collect::<Vec<_>>(),
            vec!["power", "unit", "model"]
        );
        assert_eq!(frame.value(1, "unit"), Some(Scalar::Text("c".into())));
        assert_eq!(frame.value(2, "model"), Some(Scalar::Text("Base".into())));
    }

    #[test]
    fn equality_ignores_column_order() {
        let a = Frame::builder()
            .column("x", ColumnData::Float(vec![1.0]))
            .column("y", ColumnData::Integer(vec![2]))
            .build()
            .unwrap();
        let b = Frame::builder()
            .column("y", ColumnData::Integer(vec![2]))
            .column("x", ColumnData::Float(vec![1.0]))
            .build()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn timezone_conversion_keeps_instants() {
        let frame = sample().with_timezone(chrono_tz::Tz::Etc__GMTMinus3);
        let shifted = frame.time_at(0).unwrap();
        assert_eq!(shifted.with_timezone(&Utc), ts(0));
        assert_eq!(shifted.offset().local_minus_utc(), 3 * 3600);
    }
}

//! Tabular-to-point conversion and column-role classification.

use crate::point::Point;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use fluxbridge_frame::Frame;
use hashbrown::HashSet;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Internal write-timestamp marker column, excluded from role inference by
/// default
pub const WRITE_MARKER_COLUMN: &str = "write_time";

/// The role a column plays in one conversion call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Categorical dimension, coerced to string
    Tag,
    /// Numeric measured value, coerced to 64-bit float
    Field,
    /// Excluded from the produced points
    Ignored,
}

/// Options controlling [`convert`].
///
/// Column lists left unset trigger inference: numeric columns become
/// fields, the non-ignored remainder becomes tags.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    tag_columns: Option<Vec<String>>,
    field_columns: Option<Vec<String>>,
    timestamp_column: Option<String>,
    additional_tags: BTreeMap<String, String>,
    ignored_columns: Vec<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            tag_columns: None,
            field_columns: None,
            timestamp_column: None,
            additional_tags: BTreeMap::new(),
            ignored_columns: vec![WRITE_MARKER_COLUMN.to_owned()],
        }
    }
}

impl ConvertOptions {
    /// Options with full inference and the default ignore list
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the tag columns explicitly, disabling tag inference
    pub fn tag_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Declare the field columns explicitly, disabling field inference
    pub fn field_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Take per-row timestamps from the named column instead of the frame
    /// index
    pub fn timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = Some(column.into());
        self
    }

    /// Add a constant-valued tag applied to every row before role
    /// inference, replacing any same-named column
    pub fn additional_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_tags.insert(key.into(), value.into());
        self
    }

    /// Add several constant-valued tags at once
    pub fn additional_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.additional_tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Exclude a column from every role
    pub fn ignore_column(mut self, column: impl Into<String>) -> Self {
        self.ignored_columns.push(column.into());
        self
    }

    /// The constant tags applied before inference
    pub fn constant_tags(&self) -> &BTreeMap<String, String> {
        &self.additional_tags
    }
}

/// Assign exactly one [`ColumnRole`] to every column of `frame`.
///
/// Explicit lists win over inference. With inference, the numeric-dtype
/// test decides fields, and every remaining non-ignored column is a tag.
/// When a column list is given explicitly, columns named in neither list
/// are ignored. The timestamp column, when set, is consumed as the row
/// timestamp and never doubles as a tag or field.
pub fn classify_columns(frame: &Frame, options: &ConvertOptions) -> IndexMap<String, ColumnRole> {
    let mut ignored: HashSet<&str> = options
        .ignored_columns
        .iter()
        .map(String::as_str)
        .collect();
    if let Some(ts) = &options.timestamp_column {
        ignored.insert(ts.as_str());
    }

    let explicit_fields: Option<HashSet<&str>> = options
        .field_columns
        .as_ref()
        .map(|cols| cols.iter().map(String::as_str).collect());
    let explicit_tags: Option<HashSet<&str>> = options
        .tag_columns
        .as_ref()
        .map(|cols| cols.iter().map(String::as_str).collect());

    let mut roles = IndexMap::with_capacity(frame.column_names().count());
    for (name, data) in frame.columns() {
        let role = if ignored.contains(name) {
            ColumnRole::Ignored
        } else if let Some(fields) = &explicit_fields {
            if fields.contains(name) {
                ColumnRole::Field
            } else {
                match &explicit_tags {
                    Some(tags) if tags.contains(name) => ColumnRole::Tag,
                    Some(_) => ColumnRole::Ignored,
                    None => ColumnRole::Tag,
                }
            }
        } else if let Some(tags) = &explicit_tags {
            if tags.contains(name) {
                ColumnRole::Tag
            } else if data.is_numeric() {
                ColumnRole::Field
            } else {
                ColumnRole::Ignored
            }
        } else if data.is_numeric() {
            ColumnRole::Field
        } else {
            ColumnRole::Tag
        };
        roles.insert(name.to_owned(), role);
    }
    roles
}

/// Convert each row of `frame` into a [`Point`] for `measurement`.
///
/// Output order matches input row order. A row whose field value cannot be
/// coerced is skipped with a warning; the batch is not aborted. Points get
/// no timestamp when neither a timestamp column nor a time index supplies
/// one, leaving the stamp to be applied at dispatch.
pub fn convert(frame: &Frame, measurement: &str, options: &ConvertOptions) -> Result<Vec<Point>> {
    let augmented;
    let frame = if options.additional_tags.is_empty() {
        frame
    } else {
        let mut f = frame.clone();
        for (key, value) in &options.additional_tags {
            f.set_constant_text(key, value);
        }
        augmented = f;
        &augmented
    };

    let roles = classify_columns(frame, options);
    let tag_columns: Vec<&str> = roles
        .iter()
        .filter(|(_, r)| **r == ColumnRole::Tag)
        .map(|(n, _)| n.as_str())
        .collect();
    let field_columns: Vec<&str> = roles
        .iter()
        .filter(|(_, r)| **r == ColumnRole::Field)
        .map(|(n, _)| n.as_str())
        .collect();
    debug!(
        measurement,
        tags = tag_columns.len(),
        fields = field_columns.len(),
        rows = frame.row_count(),
        "classified columns for conversion"
    );

    let mut points = Vec::with_capacity(frame.row_count());
    'rows: for row in 0..frame.row_count() {
        let timestamp = resolve_timestamp(frame, row, options);

        let mut tags = BTreeMap::new();
        for column in &tag_columns {
            if let Some(value) = frame.value(row, column) {
                tags.insert((*column).to_owned(), value.to_string());
            }
        }

        let mut fields = BTreeMap::new();
        for column in &field_columns {
            match frame.value(row, column).and_then(|v| v.to_field_value()) {
                Some(value) => {
                    fields.insert((*column).to_owned(), value);
                }
                None => {
                    let err = Error::FieldCoercion {
                        column: (*column).to_owned(),
                        row,
                    };
                    warn!(%err, measurement, "skipping row");
                    continue 'rows;
                }
            }
        }

        points.push(Point::new(measurement, fields, tags, timestamp)?);
    }
    Ok(points)
}

/// Per-row timestamp priority: explicit timestamp column, then the frame's
/// time index, then none.
fn resolve_timestamp(frame: &Frame, row: usize, options: &ConvertOptions) -> Option<DateTime<Utc>> {
    if let Some(column) = &options.timestamp_column {
        if let Some(at) = frame.value(row, column).and_then(|v| v.to_instant()) {
            return Some(at);
        }
    }
    frame.time_at(row).map(|t| t.with_timezone(&Utc))
}

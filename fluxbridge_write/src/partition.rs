//! Partitioning heterogeneous rows into homogeneous tag-combination groups.

use crate::{Error, Result};
use fluxbridge_frame::Frame;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::debug;

/// A row partition sharing one exact tag-value combination
#[derive(Debug, Clone, PartialEq)]
pub struct TagGroup {
    /// The tag values common to every row in the group
    pub tags: BTreeMap<String, String>,
    /// Row offsets into the source frame, in source order
    pub rows: Vec<usize>,
}

/// Group the rows of `frame` by their distinct combinations of values
/// across `tag_columns`, in first-seen order.
///
/// Values compare by exact string equality after coercion. One hash key is
/// built per row, so the whole partition is O(rows). Every row lands in
/// exactly one group; the union of all groups is the full row set.
///
/// Zero tag columns is valid and yields a single untagged group holding
/// all rows.
pub fn partition<S: AsRef<str>>(frame: &Frame, tag_columns: &[S]) -> Result<Vec<TagGroup>> {
    for column in tag_columns {
        if !frame.has_column(column.as_ref()) {
            return Err(Error::TagColumnNotFound {
                column: column.as_ref().to_owned(),
            });
        }
    }

    if tag_columns.is_empty() {
        return Ok(vec![TagGroup {
            tags: BTreeMap::new(),
            rows: (0..frame.row_count()).collect(),
        }]);
    }

    let mut groups: IndexMap<Vec<String>, Vec<usize>> = IndexMap::new();
    for row in 0..frame.row_count() {
        let key: Vec<String> = tag_columns
            .iter()
            .map(|column| {
                frame
                    .value(row, column.as_ref())
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect();
        groups.entry(key).or_default().push(row);
    }
    debug!(
        rows = frame.row_count(),
        tag_columns = tag_columns.len(),
        groups = groups.len(),
        "partitioned frame into tag groups"
    );

    Ok(groups
        .into_iter()
        .map(|(values, rows)| TagGroup {
            tags: tag_columns
                .iter()
                .map(|c| c.as_ref().to_owned())
                .zip(values)
                .collect(),
            rows,
        })
        .collect())
}

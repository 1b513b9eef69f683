//! Turning raw result sets back into frames.

use crate::response::{QueryResponse, Series};
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use fluxbridge_frame::{ColumnData, Frame, FrameIndex};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

/// The time column name used by the store in raw results
const TIME_COLUMN: &str = "time";

/// Reconstruct a [`Frame`] from the series of `response` belonging to
/// `measurement`.
///
/// A query that matches nothing is a normal outcome: when the measurement
/// is absent from the result, this returns `Ok(None)`. A statement-level
/// error reported by the store is a true failure and surfaces as
/// [`Error::Store`].
///
/// The store's `time` column becomes the frame's time index. Group-by tag
/// values, when present, are appended as constant-valued text columns.
/// With `timezone` given and a non-empty result, index offsets are
/// converted for presentation; the underlying instants do not change.
pub fn reconstruct(
    response: &QueryResponse,
    measurement: &str,
    timezone: Option<&str>,
) -> Result<Option<Frame>> {
    for result in &response.results {
        if let Some(message) = &result.error {
            return Err(Error::Store {
                message: message.clone(),
            });
        }
    }

    let matching: Vec<&Series> = response
        .series()
        .filter(|s| s.name == measurement)
        .collect();
    let Some(first) = matching.first() else {
        debug!(measurement, "measurement absent from result set");
        return Ok(None);
    };

    let columns = &first.columns;
    let time_pos = columns.iter().position(|c| c == TIME_COLUMN);

    // Union of group-by tag keys across the matching series, first-seen order
    let mut tag_columns: IndexMap<String, Vec<String>> = IndexMap::new();
    for series in &matching {
        if let Some(tags) = &series.tags {
            for key in tags.keys() {
                tag_columns.entry(key.clone()).or_default();
            }
        }
    }

    let mut cells: Vec<Vec<&Value>> = vec![Vec::new(); columns.len()];
    let mut times: Vec<DateTime<FixedOffset>> = Vec::new();
    for series in &matching {
        for row in &series.values {
            for (pos, cell) in row.iter().enumerate().take(columns.len()) {
                if Some(pos) == time_pos {
                    times.push(parse_instant(cell)?);
                } else {
                    cells[pos].push(cell);
                }
            }
            for (key, values) in tag_columns.iter_mut() {
                let value = series
                    .tags
                    .as_ref()
                    .and_then(|t| t.get(key))
                    .cloned()
                    .unwrap_or_default();
                values.push(value);
            }
        }
    }

    let mut builder = Frame::builder();
    for (pos, name) in columns.iter().enumerate() {
        if Some(pos) == time_pos {
            continue;
        }
        builder = builder.column(name, sniff_column(&cells[pos]));
    }
    for (name, values) in tag_columns {
        builder = builder.column(name, ColumnData::Text(values));
    }
    if time_pos.is_some() {
        builder = builder.time_index_fixed(times);
    }
    let mut frame = builder.build()?;

    if let Some(zone) = timezone {
        if !frame.is_empty() {
            let tz: Tz = zone.parse().map_err(|_| Error::UnknownTimezone {
                zone: zone.to_owned(),
            })?;
            frame = frame.with_timezone(tz);
        }
    }
    Ok(Some(frame))
}

/// Pivot a narrow `name`/`value` frame into one column per distinct name,
/// preserving the original index in first-seen order.
///
/// Cells with no (index, name) pair come out as NaN. A frame lacking
/// either column is returned unchanged, since the pivot is not applicable.
pub fn unstack(frame: &Frame) -> Frame {
    if !frame.has_column("name") || !frame.has_column("value") {
        return frame.clone();
    }

    // Output row per distinct index entry; for a positional index every
    // source row keys itself.
    let mut out_rows: IndexMap<i64, usize> = IndexMap::new();
    let mut times: Vec<DateTime<FixedOffset>> = Vec::new();
    let mut columns: IndexMap<String, Vec<f64>> = IndexMap::new();

    for row in 0..frame.row_count() {
        let key = match frame.time_at(row) {
            Some(t) => t.timestamp_nanos_opt().unwrap_or(i64::MIN),
            None => row as i64,
        };
        let out = match out_rows.get(&key) {
            Some(out) => *out,
            None => {
                let out = out_rows.len();
                out_rows.insert(key, out);
                if let Some(t) = frame.time_at(row) {
                    times.push(t);
                }
                for values in columns.values_mut() {
                    values.push(f64::NAN);
                }
                out
            }
        };

        let name = frame
            .value(row, "name")
            .map(|v| v.to_string())
            .unwrap_or_default();
        let value = frame
            .value(row, "value")
            .and_then(|v| v.to_field_value())
            .unwrap_or(f64::NAN);
        let column = columns
            .entry(name)
            .or_insert_with(|| vec![f64::NAN; out_rows.len()]);
        column[out] = value;
    }

    let mut builder = Frame::builder();
    for (name, values) in columns {
        builder = builder.column(name, ColumnData::Float(values));
    }
    if matches!(frame.index(), FrameIndex::Time(_)) {
        builder = builder.time_index_fixed(times);
    }
    // Columns are equal length by construction
    builder.build().unwrap_or_else(|_| frame.clone())
}

fn parse_instant(value: &Value) -> Result<DateTime<FixedOffset>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).map_err(|_| Error::InvalidTimestamp {
            value: s.clone(),
        }),
        Value::Number(n) => n
            .as_i64()
            .map(|nanos| DateTime::from_timestamp_nanos(nanos).fixed_offset())
            .ok_or_else(|| Error::InvalidTimestamp {
                value: value.to_string(),
            }),
        _ => Err(Error::InvalidTimestamp {
            value: value.to_string(),
        }),
    }
}

/// Pick a column type from the JSON cells: any string makes the column
/// text, all-boolean stays boolean, all-integer stays integer, everything
/// else (including nulls) widens to float with NaN for absent values.
fn sniff_column(cells: &[&Value]) -> ColumnData {
    if cells.iter().any(|v| v.is_string()) {
        ColumnData::Text(
            cells
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect(),
        )
    } else if !cells.is_empty() && cells.iter().all(|v| v.is_boolean()) {
        ColumnData::Boolean(cells.iter().map(|v| v.as_bool().unwrap_or_default()).collect())
    } else if !cells.is_empty() && cells.iter().all(|v| v.is_i64()) {
        ColumnData::Integer(cells.iter().map(|v| v.as_i64().unwrap_or_default()).collect())
    } else {
        ColumnData::Float(cells.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fluxbridge_frame::Scalar;
    use pretty_assertions::assert_eq;

    fn response(raw: &str) -> QueryResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn reconstructs_time_indexed_frame() {
        let response = response(
            r#"{"results": [{"series": [{
                "name": "load",
                "columns": ["time", "power", "equipment"],
                "values": [
                    ["1970-01-01T00:00:00Z", 10.5, "T3"],
                    ["1970-01-01T00:01:00Z", 11.0, "T4"]
                ]
            }]}]}"#,
        );
        let frame = reconstruct(&response, "load", None).unwrap().unwrap();
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.value(0, "power"), Some(Scalar::Float(10.5)));
        assert_eq!(frame.value(1, "equipment"), Some(Scalar::Text("T4".into())));
        assert_eq!(
            frame.time_at(1).map(|t| t.with_timezone(&Utc)),
            Some(Utc.timestamp_opt(60, 0).unwrap())
        );
    }

    #[test]
    fn absent_measurement_is_not_an_error() {
        let response = response(
            r#"{"results": [{"series": [{
                "name": "other",
                "columns": ["time", "power"],
                "values": [["1970-01-01T00:00:00Z", 1.0]]
            }]}]}"#,
        );
        assert!(reconstruct(&response, "load", None).unwrap().is_none());
    }

    #[test]
    fn statement_error_surfaces_as_failure() {
        let response = response(r#"{"results": [{"error": "syntax error"}]}"#);
        let err = reconstruct(&response, "load", None).unwrap_err();
        assert!(matches!(err, Error::Store { message } if message == "syntax error"));
    }

    #[test]
    fn epoch_nanosecond_times_are_accepted() {
        let response = response(
            r#"{"results": [{"series": [{
                "name": "load",
                "columns": ["time", "power"],
                "values": [[60000000000, 1.0]]
            }]}]}"#,
        );
        let frame = reconstruct(&response, "load", None).unwrap().unwrap();
        assert_eq!(
            frame.time_at(0).map(|t| t.with_timezone(&Utc)),
            Some(Utc.timestamp_opt(60, 0).unwrap())
        );
    }

    #[test]
    fn timezone_conversion_is_presentation_only() {
        let response = response(
            r#"{"results": [{"series": [{
                "name": "load",
                "columns": ["time", "power"],
                "values": [["1970-01-01T00:00:00Z", 1.0]]
            }]}]}"#,
        );
        let frame = reconstruct(&response, "load", Some("Etc/GMT-3"))
            .unwrap()
            .unwrap();
        let shifted = frame.time_at(0).unwrap();
        assert_eq!(shifted.offset().local_minus_utc(), 3 * 3600);
        assert_eq!(
            shifted.with_timezone(&Utc),
            Utc.timestamp_opt(0, 0).unwrap()
        );
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let response = response(
            r#"{"results": [{"series": [{
                "name": "load",
                "columns": ["time", "power"],
                "values": [["1970-01-01T00:00:00Z", 1.0]]
            }]}]}"#,
        );
        let err = reconstruct(&response, "load", Some("Mars/Olympus")).unwrap_err();
        assert!(matches!(err, Error::UnknownTimezone { .. }));
    }

    #[test]
    fn group_by_tags_become_columns() {
        let response = response(
            r#"{"results": [{"series": [
                {
                    "name": "load",
                    "tags": {"equipment": "T3"},
                    "columns": ["time", "power"],
                    "values": [["1970-01-01T00:00:00Z", 1.0]]
                },
                {
                    "name": "load",
                    "tags": {"equipment": "T4"},
                    "columns": ["time", "power"],
                    "values": [["1970-01-01T00:01:00Z", 2.0]]
                }
            ]}]}"#,
        );
        let frame = reconstruct(&response, "load", None).unwrap().unwrap();
        assert_eq!(frame.value(0, "equipment"), Some(Scalar::Text("T3".into())));
        assert_eq!(frame.value(1, "equipment"), Some(Scalar::Text("T4".into())));
    }

    #[test]
    fn unstack_pivots_name_value_rows() {
        let t1 = Utc.timestamp_opt(1, 0).unwrap();
        let frame = Frame::builder()
            .column("name", ColumnData::Text(vec!["a".into(), "b".into()]))
            .column("value", ColumnData::Float(vec![10.0, 20.0]))
            .time_index([t1, t1])
            .build()
            .unwrap();
        let wide = unstack(&frame);
        assert_eq!(wide.row_count(), 1);
        assert_eq!(wide.value(0, "a"), Some(Scalar::Float(10.0)));
        assert_eq!(wide.value(0, "b"), Some(Scalar::Float(20.0)));
        assert_eq!(wide.time_at(0), Some(t1.fixed_offset()));
    }

    #[test]
    fn unstack_fills_missing_pairs_with_nan() {
        let t1 = Utc.timestamp_opt(1, 0).unwrap();
        let t2 = Utc.timestamp_opt(2, 0).unwrap();
        let frame = Frame::builder()
            .column("name", ColumnData::Text(vec!["a".into(), "b".into()]))
            .column("value", ColumnData::Float(vec![10.0, 20.0]))
            .time_index([t1, t2])
            .build()
            .unwrap();
        let wide = unstack(&frame);
        assert_eq!(wide.row_count(), 2);
        assert_eq!(wide.value(0, "a"), Some(Scalar::Float(10.0)));
        assert!(matches!(wide.value(0, "b"), Some(Scalar::Float(v)) if v.is_nan()));
        assert_eq!(wide.value(1, "b"), Some(Scalar::Float(20.0)));
    }

    #[test]
    fn unstack_without_name_value_columns_is_identity() {
        let frame = Frame::builder()
            .column("power", ColumnData::Float(vec![1.0, 2.0]))
            .build()
            .unwrap();
        assert_eq!(unstack(&frame), frame);
    }
}

//! Filter predicates and their rendering to the store's query dialect.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Default lookback window for last-point reads.
///
/// The store has no cheap "most recent regardless of age" primitive, so
/// last-point queries bound the scan to a recent window.
pub const DEFAULT_LAST_POINT_LOOKBACK: Duration = Duration::from_secs(24 * 60 * 60);

/// Aggregation functions understood by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// Arithmetic mean
    Mean,
    /// Sum of values
    Sum,
    /// Number of non-null values
    Count,
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// Oldest value in the window
    First,
    /// Newest value in the window
    Last,
}

impl AggregateFunction {
    /// The dialect keyword for this function
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An aggregation over fixed time windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregation {
    /// The function applied per window
    pub function: AggregateFunction,
    /// The window width
    pub window: Duration,
}

impl Aggregation {
    /// An aggregation with an explicit window duration
    pub fn new(function: AggregateFunction, window: Duration) -> Self {
        Self { function, window }
    }

    /// An aggregation with a window parsed from text ("1h", "30m", "1d")
    pub fn parse(function: AggregateFunction, window: &str) -> Result<Self> {
        let window = humantime::parse_duration(window).map_err(|source| Error::InvalidDuration {
            input: window.to_owned(),
            source,
        })?;
        Ok(Self { function, window })
    }
}

/// A filter over one measurement, rendered to a dialect query string.
///
/// Only used to render a query; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    measurement: String,
    tag_equals: BTreeMap<String, String>,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    lookback: Option<Duration>,
    aggregation: Option<Aggregation>,
    field_select: Option<Vec<String>>,
    timezone: Option<String>,
    limit: Option<usize>,
    order_desc: bool,
}

impl QueryFilter {
    /// A filter selecting everything from `measurement`
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tag_equals: BTreeMap::new(),
            time_start: None,
            time_end: None,
            lookback: None,
            aggregation: None,
            field_select: None,
            timezone: None,
            limit: None,
            order_desc: false,
        }
    }

    /// The last-point specialization: newest point within a bounded
    /// lookback window, defaulting to [`DEFAULT_LAST_POINT_LOOKBACK`]
    pub fn last_point(measurement: impl Into<String>) -> Self {
        let mut filter = Self::new(measurement);
        filter.lookback = Some(DEFAULT_LAST_POINT_LOOKBACK);
        filter.order_desc = true;
        filter.limit = Some(1);
        filter
    }

    /// Require `tag = value` on every returned point
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag_equals.insert(key.into(), value.into());
        self
    }

    /// Require equality on several tags at once
    pub fn tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tag_equals
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Select the inclusive range `[start, end]`
    pub fn range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_start = Some(start);
        self.time_end = Some(end);
        self
    }

    /// Select the single instant `at` (an "as of" read; start == end is a
    /// valid, non-empty range)
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.time_start = Some(at);
        self.time_end = None;
        self
    }

    /// Override the last-point lookback window
    pub fn lookback(mut self, window: Duration) -> Self {
        self.lookback = Some(window);
        self
    }

    /// Aggregate fields over fixed windows
    pub fn aggregate(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Select only the named fields instead of everything
    pub fn select_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Append a timezone-conversion directive and convert reconstructed
    /// frames to this zone
    pub fn timezone(mut self, zone: impl Into<String>) -> Self {
        self.timezone = Some(zone.into());
        self
    }

    /// Bound the number of returned points
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The measurement this filter selects from
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// The timezone directive, if any
    pub fn timezone_name(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Render the filter to a dialect query string.
    ///
    /// Tag clauses come out in lexicographic key order, so the same filter
    /// always renders the same text. Time ranges are inclusive on both
    /// ends; a missing end falls back to the start (point-in-time read).
    /// With no start at all, no time clause is emitted and the scan is
    /// unbounded over the measurement.
    pub fn render(&self) -> String {
        let mut query = format!("SELECT {} FROM {}", self.render_select(), self.measurement);

        let mut clauses: Vec<String> = self
            .tag_equals
            .iter()
            .map(|(key, value)| format!("{key} = '{}'", escape_literal(value)))
            .collect();

        if let Some(start) = self.time_start {
            let end = self.time_end.unwrap_or(start);
            clauses.push(format!("time >= '{}'", render_instant(start)));
            clauses.push(format!("time <= '{}'", render_instant(end)));
        } else if let Some(lookback) = self.lookback {
            clauses.push(format!("time > now() - {}", render_duration(lookback)));
        } else {
            warn!(
                measurement = %self.measurement,
                "query has no time bound and will scan the whole measurement"
            );
        }

        if !clauses.is_empty() {
            query.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
        }
        if let Some(aggregation) = &self.aggregation {
            query.push_str(&format!(" GROUP BY time({})", render_duration(aggregation.window)));
        }
        if self.order_desc {
            query.push_str(" ORDER BY time DESC");
        }
        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(zone) = &self.timezone {
            query.push_str(&format!(" tz('{}')", escape_literal(zone)));
        }
        query
    }

    fn render_select(&self) -> String {
        match (&self.aggregation, &self.field_select) {
            (None, None) => "*".to_owned(),
            (None, Some(fields)) => fields.join(", "),
            (Some(aggregation), None) => format!("{}(*)", aggregation.function),
            (Some(aggregation), Some(fields)) => fields
                .iter()
                .map(|f| format!("{}({f})", aggregation.function))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// `SHOW MEASUREMENTS`
pub fn show_measurements() -> String {
    "SHOW MEASUREMENTS".to_owned()
}

/// `SHOW TAG KEYS` for one measurement
pub fn show_tag_keys(measurement: &str) -> String {
    format!("SHOW TAG KEYS FROM {measurement}")
}

/// `SHOW FIELD KEYS` for one measurement
pub fn show_field_keys(measurement: &str) -> String {
    format!("SHOW FIELD KEYS FROM {measurement}")
}

/// First/last summary of a measurement's time extent
pub fn first_last_summary(measurement: &str) -> String {
    format!("SELECT FIRST(*), LAST(*) FROM {measurement}")
}

fn render_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Render a duration in the dialect's duration syntax, using the largest
/// unit that divides it exactly
pub fn render_duration(duration: Duration) -> String {
    if duration.subsec_nanos() != 0 {
        return format!("{}ms", duration.as_millis());
    }
    let secs = duration.as_secs();
    if secs == 0 {
        "0s".to_owned()
    } else if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', r"\\").replace('\'', r"\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn renders_sorted_tag_clauses() {
        let query = QueryFilter::new("load")
            .tag("version", "1")
            .tag("equipment", "T3")
            .at(ts(0))
            .render();
        assert_eq!(
            query,
            "SELECT * FROM load WHERE equipment = 'T3' AND version = '1' \
             AND time >= '1970-01-01T00:00:00Z' AND time <= '1970-01-01T00:00:00Z'"
        );
    }

    #[test]
    fn point_in_time_range_is_inclusive() {
        let query = QueryFilter::new("load").at(ts(120)).render();
        assert!(query.contains("time >= '1970-01-01T00:02:00Z'"));
        assert!(query.contains("time <= '1970-01-01T00:02:00Z'"));
    }

    #[test]
    fn missing_start_emits_no_time_clause() {
        let query = QueryFilter::new("load").render();
        assert_eq!(query, "SELECT * FROM load");
    }

    #[test]
    fn aggregation_wraps_fields_and_groups_by_window() {
        let query = QueryFilter::new("load")
            .select_fields(["power", "pressure"])
            .aggregate(Aggregation::parse(AggregateFunction::Mean, "1h").unwrap())
            .range(ts(0), ts(7200))
            .render();
        assert_eq!(
            query,
            "SELECT mean(power), mean(pressure) FROM load \
             WHERE time >= '1970-01-01T00:00:00Z' AND time <= '1970-01-01T02:00:00Z' \
             GROUP BY time(1h)"
        );
    }

    #[test]
    fn aggregation_without_field_selection_covers_all() {
        let query = QueryFilter::new("load")
            .aggregate(Aggregation::new(AggregateFunction::Max, Duration::from_secs(60)))
            .at(ts(0))
            .render();
        assert!(query.starts_with("SELECT max(*) FROM load"));
        assert!(query.ends_with("GROUP BY time(1m)"));
    }

    #[test]
    fn last_point_bounds_scan_and_limits_to_one() {
        let query = QueryFilter::last_point("load").tag("equipment", "T3").render();
        assert_eq!(
            query,
            "SELECT * FROM load WHERE equipment = 'T3' AND time > now() - 1d \
             ORDER BY time DESC LIMIT 1"
        );
    }

    #[test]
    fn last_point_lookback_is_overridable() {
        let query = QueryFilter::last_point("load")
            .lookback(Duration::from_secs(2 * 3600))
            .render();
        assert!(query.contains("time > now() - 2h"));
    }

    #[test]
    fn timezone_directive_trails_everything() {
        let query = QueryFilter::new("load")
            .at(ts(0))
            .limit(10)
            .timezone("Etc/GMT-3")
            .render();
        assert!(query.ends_with("LIMIT 10 tz('Etc/GMT-3')"));
    }

    #[test]
    fn tag_values_escape_single_quotes() {
        let query = QueryFilter::new("load").tag("note", "it's").render();
        assert!(query.contains(r"note = 'it\'s'"));
    }

    #[test]
    fn duration_rendering_picks_largest_exact_unit() {
        assert_eq!(render_duration(Duration::from_secs(86_400)), "1d");
        assert_eq!(render_duration(Duration::from_secs(7_200)), "2h");
        assert_eq!(render_duration(Duration::from_secs(1_800)), "30m");
        assert_eq!(render_duration(Duration::from_secs(45)), "45s");
        assert_eq!(render_duration(Duration::from_millis(1_500)), "1500ms");
        assert_eq!(render_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn invalid_window_is_rejected() {
        let err = Aggregation::parse(AggregateFunction::Mean, "one hour").unwrap_err();
        assert!(matches!(err, Error::InvalidDuration { .. }));
    }

    #[test]
    fn schema_inspection_queries() {
        assert_eq!(show_measurements(), "SHOW MEASUREMENTS");
        assert_eq!(show_tag_keys("load"), "SHOW TAG KEYS FROM load");
        assert_eq!(show_field_keys("load"), "SHOW FIELD KEYS FROM load");
        assert_eq!(first_last_summary("load"), "SELECT FIRST(*), LAST(*) FROM load");
    }
}

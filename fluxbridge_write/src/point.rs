//! The atomic unit of data sent to the store.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A single measurement observation: numeric fields, string tags, and an
/// optional timestamp.
///
/// Tags and fields are kept in `BTreeMap`s so keys come out sorted, which
/// keeps rendered output deterministic and improves locality on the server
/// side.
///
/// A `timestamp` of `None` means "assign at dispatch": the write path stamps
/// every unstamped point of a batch with one shared instant, so points
/// produced by the same conversion call do not race each other's clock
/// reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, f64>,
    timestamp: Option<DateTime<Utc>>,
}

impl Point {
    /// Construct a point, validating its shape.
    ///
    /// Fails when `fields` is empty or when a key appears in both `tags`
    /// and `fields`.
    pub fn new(
        measurement: impl Into<String>,
        fields: BTreeMap<String, f64>,
        tags: BTreeMap<String, String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let measurement = measurement.into();
        if fields.is_empty() {
            return Err(Error::EmptyFields { measurement });
        }
        if let Some(key) = fields.keys().find(|k| tags.contains_key(*k)) {
            return Err(Error::TagFieldCollision {
                measurement,
                key: key.clone(),
            });
        }
        Ok(Self {
            measurement,
            tags,
            fields,
            timestamp,
        })
    }

    /// Create a builder to incrementally construct a `Point`
    pub fn builder(measurement: impl Into<String>) -> PointBuilder {
        PointBuilder::new(measurement)
    }

    /// The measurement this point belongs to
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// The tag set, sorted by key
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// The field set, sorted by key
    pub fn fields(&self) -> &BTreeMap<String, f64> {
        &self.fields
    }

    /// The explicit timestamp, if any
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Assign `at` as the timestamp unless one is already set.
    ///
    /// Called once per batch at dispatch with a shared instant.
    pub fn stamp_if_unset(&mut self, at: DateTime<Utc>) {
        self.timestamp.get_or_insert(at);
    }
}

/// Incrementally constructs a [`Point`].
///
/// Create this via `Point::builder`.
#[derive(Debug)]
pub struct PointBuilder {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, f64>,
    timestamp: Option<DateTime<Utc>>,
}

impl PointBuilder {
    fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Sets a tag, replacing any existing tag of the same name
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Sets a field, replacing any existing field of the same name
    pub fn field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Sets the timestamp, replacing any existing timestamp
    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Validate and construct the point
    pub fn build(self) -> Result<Point> {
        Point::new(self.measurement, self.fields, self.tags, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builder_sets_tags_and_fields() {
        let at = Utc.timestamp_opt(1_000, 0).unwrap();
        let point = Point::builder("turbine_load")
            .tag("equipment", "T3")
            .field("power", 42.5)
            .timestamp(at)
            .build()
            .unwrap();

        assert_eq!(point.measurement(), "turbine_load");
        assert_eq!(point.tags()["equipment"], "T3");
        assert_eq!(point.fields()["power"], 42.5);
        assert_eq!(point.timestamp(), Some(at));
    }

    #[test]
    fn empty_fields_rejected() {
        let err = Point::builder("m").tag("a", "b").build().unwrap_err();
        assert!(matches!(err, Error::EmptyFields { .. }));
    }

    #[test]
    fn tag_field_collision_rejected() {
        let err = Point::builder("m")
            .tag("power", "high")
            .field("power", 1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::TagFieldCollision { key, .. } if key == "power"));
    }

    #[test]
    fn stamping_does_not_override_explicit_timestamp() {
        let explicit = Utc.timestamp_opt(5, 0).unwrap();
        let later = Utc.timestamp_opt(100, 0).unwrap();

        let mut stamped = Point::builder("m")
            .field("v", 1.0)
            .timestamp(explicit)
            .build()
            .unwrap();
        stamped.stamp_if_unset(later);
        assert_eq!(stamped.timestamp(), Some(explicit));

        let mut unstamped = Point::builder("m").field("v", 1.0).build().unwrap();
        unstamped.stamp_if_unset(later);
        assert_eq!(unstamped.timestamp(), Some(later));
    }
}

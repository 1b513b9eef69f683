//! Typed column storage and the discriminated cell value type.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::{self, Formatter};

/// A single cell value.
///
/// An explicit enumerated type per cell so that column-role decisions
/// (numeric vs. categorical) are made by matching, never by runtime
/// downcasting.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// A 64-bit floating point number
    Float(f64),
    /// A 64-bit signed integer
    Integer(i64),
    /// A true or false value
    Boolean(bool),
    /// A string value
    Text(String),
    /// A UTC instant
    Time(DateTime<Utc>),
    /// An absent value
    Null,
}

impl Scalar {
    /// Coerce this value to a numeric field value, if possible.
    ///
    /// Integers and booleans widen losslessly enough for field purposes;
    /// text is parsed. Instants and absent values do not coerce.
    pub fn to_field_value(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Text(v) => v.trim().parse().ok(),
            Self::Time(_) | Self::Null => None,
        }
    }

    /// Coerce this value to a UTC instant, if it holds one.
    pub fn to_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            Self::Text(v) => DateTime::parse_from_rfc3339(v)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Whether this is the absent value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

/// The data for a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// 64-bit floating point values
    Float(Vec<f64>),
    /// 64-bit signed integer values
    Integer(Vec<i64>),
    /// Boolean values
    Boolean(Vec<bool>),
    /// String values
    Text(Vec<String>),
    /// UTC instants
    Time(Vec<DateTime<Utc>>),
}

impl ColumnData {
    /// The number of rows stored in this column
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Integer(v) => v.len(),
            Self::Boolean(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Time(v) => v.len(),
        }
    }

    /// Whether this column holds no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The numeric-dtype test used for column-role inference.
    ///
    /// Booleans and text are categorical, instants are neither.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Float(_) | Self::Integer(_))
    }

    /// The value at `row`, or `None` when out of bounds
    pub fn value(&self, row: usize) -> Option<Scalar> {
        match self {
            Self::Float(v) => v.get(row).map(|v| Scalar::Float(*v)),
            Self::Integer(v) => v.get(row).map(|v| Scalar::Integer(*v)),
            Self::Boolean(v) => v.get(row).map(|v| Scalar::Boolean(*v)),
            Self::Text(v) => v.get(row).map(|v| Scalar::Text(v.clone())),
            Self::Time(v) => v.get(row).map(|v| Scalar::Time(*v)),
        }
    }

    /// A new column containing the rows of `self` selected by `rows`,
    /// in the given order. Out-of-bounds indices are dropped.
    pub fn take(&self, rows: &[usize]) -> Self {
        fn gather<T: Clone>(data: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().filter_map(|r| data.get(*r).cloned()).collect()
        }
        match self {
            Self::Float(v) => Self::Float(gather(v, rows)),
            Self::Integer(v) => Self::Integer(gather(v, rows)),
            Self::Boolean(v) => Self::Boolean(gather(v, rows)),
            Self::Text(v) => Self::Text(gather(v, rows)),
            Self::Time(v) => Self::Time(gather(v, rows)),
        }
    }

    /// A text column repeating `value` for `len` rows
    pub fn constant_text(value: impl Into<String>, len: usize) -> Self {
        Self::Text(vec![value.into(); len])
    }
}

impl fmt::Display for ColumnData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "Float({})", v.len()),
            Self::Integer(v) => write!(f, "Integer({})", v.len()),
            Self::Boolean(v) => write!(f, "Boolean({})", v.len()),
            Self::Text(v) => write!(f, "Text({})", v.len()),
            Self::Time(v) => write!(f, "Time({})", v.len()),
        }
    }
}

impl FromIterator<f64> for ColumnData {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        Self::Float(iter.into_iter().collect())
    }
}

impl FromIterator<i64> for ColumnData {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self::Integer(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for ColumnData {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self::Text(iter.into_iter().map(str::to_owned).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_dtype_detection() {
        assert!(ColumnData::Float(vec![1.0]).is_numeric());
        assert!(ColumnData::Integer(vec![1]).is_numeric());
        assert!(!ColumnData::Boolean(vec![true]).is_numeric());
        assert!(!ColumnData::Text(vec!["a".into()]).is_numeric());
        assert!(!ColumnData::Time(vec![Utc::now()]).is_numeric());
    }

    #[test]
    fn field_coercion() {
        assert_eq!(Scalar::Float(1.5).to_field_value(), Some(1.5));
        assert_eq!(Scalar::Integer(2).to_field_value(), Some(2.0));
        assert_eq!(Scalar::Boolean(true).to_field_value(), Some(1.0));
        assert_eq!(Scalar::Text("3.25".into()).to_field_value(), Some(3.25));
        assert_eq!(Scalar::Text("not a number".into()).to_field_value(), None);
        assert_eq!(Scalar::Null.to_field_value(), None);
    }

    #[test]
    fn take_preserves_order_and_drops_out_of_bounds() {
        let col = ColumnData::Integer(vec![10, 20, 30]);
        assert_eq!(col.take(&[2, 0, 9]), ColumnData::Integer(vec![30, 10]));
    }

    #[test]
    fn stringification() {
        assert_eq!(Scalar::Float(0.5).to_string(), "0.5");
        assert_eq!(Scalar::Boolean(false).to_string(), "false");
        assert_eq!(Scalar::Text("V2".into()).to_string(), "V2");
    }
}

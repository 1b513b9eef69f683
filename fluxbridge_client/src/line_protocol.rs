//! Rendering point batches to the store's line-based write format.

use chrono::{DateTime, Utc};
use fluxbridge_write::Point;
use std::borrow::Cow;

// Special characters per the write format: measurements escape commas and
// spaces; tag/field keys and tag values also escape equals signs.
const MEASUREMENT_DELIMITERS: &[char] = &[',', ' '];
const KEY_DELIMITERS: &[char] = &[',', '=', ' '];

/// Render `points` to the line format, one line per point, each line
/// terminated by a newline.
pub(crate) fn render(points: &[Point]) -> String {
    let mut out = String::new();
    for point in points {
        render_point(point, &mut out);
        out.push('\n');
    }
    out
}

fn render_point(point: &Point, out: &mut String) {
    out.push_str(&escape(point.measurement(), MEASUREMENT_DELIMITERS));
    for (key, value) in point.tags() {
        out.push(',');
        out.push_str(&escape(key, KEY_DELIMITERS));
        out.push('=');
        out.push_str(&escape(value, KEY_DELIMITERS));
    }
    for (i, (key, value)) in point.fields().iter().enumerate() {
        out.push(if i == 0 { ' ' } else { ',' });
        out.push_str(&escape(key, KEY_DELIMITERS));
        out.push('=');
        out.push_str(&value.to_string());
    }
    if let Some(at) = point.timestamp() {
        out.push(' ');
        out.push_str(&timestamp_nanos(at).to_string());
    }
}

fn timestamp_nanos(at: DateTime<Utc>) -> i64 {
    // Nanosecond precision overflows for instants outside roughly
    // 1677..2262; fall back through microseconds for those.
    at.timestamp_nanos_opt()
        .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000))
}

fn escape<'a>(value: &'a str, delimiters: &[char]) -> Cow<'a, str> {
    if !value.contains(delimiters) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if delimiters.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_tags_fields_and_timestamp() {
        let point = Point::builder("swap")
            .tag("host", "server01")
            .tag("name", "disk0")
            .field("in", 3.0)
            .field("out", 4.0)
            .timestamp(Utc.timestamp_opt(0, 1).unwrap())
            .build()
            .unwrap();
        assert_eq!(render(&[point]), "swap,host=server01,name=disk0 in=3,out=4 1\n");
    }

    #[test]
    fn unstamped_points_omit_the_timestamp() {
        let point = Point::builder("m").field("v", 1.5).build().unwrap();
        assert_eq!(render(&[point]), "m v=1.5\n");
    }

    const ALL_THE_DELIMITERS: &str = r#"alpha,beta=delta gamma"epsilon"#;

    #[test]
    fn measurement_escapes_commas_and_spaces() {
        let point = Point::builder(ALL_THE_DELIMITERS)
            .field("v", 1.0)
            .build()
            .unwrap();
        assert!(render(&[point]).starts_with(r#"alpha\,beta=delta\ gamma"epsilon"#));
    }

    #[test]
    fn keys_and_tag_values_escape_equals_too() {
        let point = Point::builder("m")
            .tag(ALL_THE_DELIMITERS, ALL_THE_DELIMITERS)
            .field("v", 1.0)
            .build()
            .unwrap();
        let rendered = render(&[point]);
        let escaped = r#"alpha\,beta\=delta\ gamma"epsilon"#;
        assert!(rendered.contains(&format!("{escaped}={escaped}")));
    }
}

//! Serde mapping of the store's raw query response.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The raw response to one query request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    /// One entry per statement in the request
    #[serde(default)]
    pub results: Vec<StatementResult>,
}

impl QueryResponse {
    /// Iterate every series across all statements
    pub fn series(&self) -> impl Iterator<Item = &Series> {
        self.results.iter().flat_map(|r| r.series.iter())
    }
}

/// The result of a single statement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementResult {
    /// Position of the statement in the request
    #[serde(default)]
    pub statement_id: u32,

    /// The point sets returned by the statement
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Series>,

    /// Statement-level failure reported by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One returned point set: a measurement name, column names, and row values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Series {
    /// The measurement the rows belong to
    pub name: String,

    /// Group-by tag values, when the statement grouped by tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    /// Column names, aligned with each row of `values`
    #[serde(default)]
    pub columns: Vec<String>,

    /// Row-major cell values
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_store_response() {
        let raw = r#"{
            "results": [{
                "statement_id": 0,
                "series": [{
                    "name": "load",
                    "columns": ["time", "power", "equipment"],
                    "values": [
                        ["1970-01-01T00:00:00Z", 10.5, "T3"],
                        ["1970-01-01T00:01:00Z", 11.0, "T3"]
                    ]
                }]
            }]
        }"#;
        let response: QueryResponse = serde_json::from_str(raw).unwrap();
        let series: Vec<_> = response.series().collect();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].name, "load");
        assert_eq!(series[0].columns, vec!["time", "power", "equipment"]);
        assert_eq!(series[0].values.len(), 2);
    }

    #[test]
    fn deserializes_statement_error() {
        let raw = r#"{"results": [{"statement_id": 0, "error": "syntax error"}]}"#;
        let response: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.results[0].error.as_deref(), Some("syntax error"));
        assert!(response.series().next().is_none());
    }

    #[test]
    fn empty_response_has_no_series() {
        let response: QueryResponse = serde_json::from_str(r#"{"results": [{}]}"#).unwrap();
        assert!(response.series().next().is_none());
    }
}

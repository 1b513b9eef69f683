//! Reusable baseline tag mappings.

use std::collections::BTreeMap;

/// Tag key for the fleet a series belongs to
pub const TAG_FLEET: &str = "fleet";
/// Tag key for the equipment unit
pub const TAG_EQUIPMENT: &str = "equipment";
/// Tag key for the kind of calculation that produced the data
pub const TAG_TYPE_CALC: &str = "type_calc";
/// Tag key for the scenario under which the data was produced
pub const TAG_SCENARIO: &str = "scenario";
/// Tag key for the model variant
pub const TAG_MODEL: &str = "model";
/// Tag key for the model version
pub const TAG_VERSION: &str = "version";

const DEFAULT_FLEET: &str = "none";
const DEFAULT_EQUIPMENT: &str = "All";
const DEFAULT_TYPE_CALC: &str = "calc";
const DEFAULT_SCENARIO: &str = "Base";
const DEFAULT_MODEL: &str = "Base";
const DEFAULT_VERSION: &str = "1";

/// A named, reusable default tag mapping.
///
/// The baseline carries the six classification dimensions every written
/// series shares. Per-call overrides replace baseline values key by key;
/// the override always wins on collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPreset {
    tags: BTreeMap<String, String>,
}

impl TagPreset {
    /// The baseline preset: all six classification dimensions at their
    /// default values
    pub fn basic() -> Self {
        let tags = [
            (TAG_FLEET, DEFAULT_FLEET),
            (TAG_EQUIPMENT, DEFAULT_EQUIPMENT),
            (TAG_TYPE_CALC, DEFAULT_TYPE_CALC),
            (TAG_SCENARIO, DEFAULT_SCENARIO),
            (TAG_MODEL, DEFAULT_MODEL),
            (TAG_VERSION, DEFAULT_VERSION),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        Self { tags }
    }

    /// A preset with no baseline at all
    pub fn empty() -> Self {
        Self {
            tags: BTreeMap::new(),
        }
    }

    /// Override one dimension; the override wins on collision
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Apply several overrides at once
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// The resolved tag mapping
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Consume the preset into its tag mapping
    pub fn into_tags(self) -> BTreeMap<String, String> {
        self.tags
    }
}

impl Default for TagPreset {
    fn default() -> Self {
        Self::basic()
    }
}

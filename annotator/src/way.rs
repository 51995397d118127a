//! Way identifiers and tag records.
//!
//! A [`TagRecord`] is what the engine returns for one way: the way id under
//! the reserved `_way_id` key plus an open set of named tags. Typed accessors
//! cover the fields the projected response shape extracts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved key carrying the way id in a serialized [`TagRecord`].
pub const WAY_ID_KEY: &str = "_way_id";

/// Tag holding the posted speed limit.
pub const MAX_SPEED_TAG: &str = "maxspeed";

/// Tag holding a time- or condition-dependent speed limit.
pub const CONDITIONAL_MAX_SPEED_TAG: &str = "maxspeed:conditional";

/// Tag marking a way that runs through a tunnel.
pub const TUNNEL_TAG: &str = "tunnel";

/// Tag marking a way that runs over a bridge.
pub const BRIDGE_TAG: &str = "bridge";

/// Identifier of a map node.
pub type NodeId = i64;

/// A `(longitude, latitude)` pair in decimal degrees.
pub type LonLat = (f64, f64);

/// Opaque identifier of a road segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WayId(pub u64);

impl fmt::Display for WayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value of a single tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Flag(bool),
    Text(String),
    Missing,
}

impl TagValue {
    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a yes/no flag.
    ///
    /// `Flag(true)` and any text other than `no`, `false` or `0` count as set;
    /// OSM uses values such as `yes`, `building_passage` or `viaduct` for these.
    pub fn is_set(&self) -> bool {
        match self {
            TagValue::Flag(b) => *b,
            TagValue::Text(s) => !matches!(s.as_str(), "no" | "false" | "0" | ""),
            TagValue::Missing => false,
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Text(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::Text(s)
    }
}

impl From<bool> for TagValue {
    fn from(b: bool) -> Self {
        TagValue::Flag(b)
    }
}

/// Tags of one way, as returned by the engine.
///
/// Serializes as a flat JSON object: `{"_way_id": 10, "name": "Main St", ...}`.
/// Tag keys are kept sorted so that equal records always serialize to the
/// same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    #[serde(rename = "_way_id")]
    pub way_id: WayId,
    #[serde(flatten)]
    tags: BTreeMap<String, TagValue>,
}

impl TagRecord {
    /// Create an empty record for a way.
    pub fn new(way_id: WayId) -> Self {
        Self {
            way_id,
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag, returning the record for chaining.
    ///
    /// The reserved `_way_id` key is ignored.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a tag. The reserved `_way_id` key is ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        let key = key.into();
        if key != WAY_ID_KEY {
            self.tags.insert(key, value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }

    pub fn tags(&self) -> &BTreeMap<String, TagValue> {
        &self.tags
    }

    /// Keep only the tags whose key satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.tags.retain(|k, _| keep(k));
    }

    pub fn max_speed(&self) -> Option<&str> {
        self.get(MAX_SPEED_TAG).and_then(TagValue::as_text)
    }

    pub fn conditional_max_speed(&self) -> Option<&str> {
        self.get(CONDITIONAL_MAX_SPEED_TAG)
            .and_then(TagValue::as_text)
    }

    pub fn is_tunnel(&self) -> bool {
        self.get(TUNNEL_TAG).is_some_and(TagValue::is_set)
    }

    pub fn is_bridge(&self) -> bool {
        self.get(BRIDGE_TAG).is_some_and(TagValue::is_set)
    }

    /// Extract the fixed field subset used by the projected response shape.
    pub fn project(&self) -> ProjectedTags {
        ProjectedTags(
            self.max_speed().map(str::to_string),
            self.conditional_max_speed().map(str::to_string),
            u8::from(self.is_tunnel()),
            u8::from(self.is_bridge()),
        )
    }
}

/// `(maxspeed, maxspeed:conditional, tunnel, bridge)` for one route position.
///
/// Serializes as a 4-element array; the flags are encoded as `0`/`1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedTags(
    pub Option<String>,
    pub Option<String>,
    pub u8,
    pub u8,
);

//! Validation of route queries.
//!
//! A route arrives either as a JSON body (`{"nodes": [...]}` or
//! `{"coordinates": [[lon, lat], ...]}`) or as a path segment
//! (`1,2,3` or `lon,lat;lon,lat`). Every form is checked here before the
//! engine sees it; a single bad element rejects the whole request.

use serde_json::Value;

use crate::error::{AnnotatorError, Result};
use crate::way::{LonLat, NodeId};

/// Body key holding a node id list.
pub const NODES_KEY: &str = "nodes";

/// Body key holding a coordinate list.
pub const COORDINATES_KEY: &str = "coordinates";

/// A validated route.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteQuery {
    /// Ordered node identifiers.
    Nodes(Vec<NodeId>),
    /// Ordered `(lon, lat)` pairs.
    Coordinates(Vec<LonLat>),
}

impl RouteQuery {
    pub fn len(&self) -> usize {
        match self {
            RouteQuery::Nodes(nodes) => nodes.len(),
            RouteQuery::Coordinates(coords) => coords.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pull `key` out of a JSON request body.
///
/// The body must be a JSON object carrying the key; an empty body, invalid
/// JSON or a missing key are all rejected.
pub fn from_body(body: &[u8], key: &str) -> Result<Value> {
    if body.is_empty() {
        return Err(AnnotatorError::invalid("request body is empty"));
    }
    let mut value: Value = serde_json::from_slice(body)
        .map_err(|e| AnnotatorError::invalid(format!("body is not valid JSON: {e}")))?;

    match value.get_mut(key) {
        Some(Value::Null) | None => Err(AnnotatorError::invalid(format!(
            "body has no `{key}` field"
        ))),
        Some(v) => Ok(v.take()),
    }
}

/// Validate a JSON node id list.
pub fn validate_nodes(payload: &Value) -> Result<Vec<NodeId>> {
    let items = payload
        .as_array()
        .ok_or_else(|| AnnotatorError::invalid("`nodes` must be an array"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| node_id_from_json(item).map_err(|reason| element_error(i, reason)))
        .collect()
}

/// Validate a JSON coordinate list.
pub fn validate_coordinates(payload: &Value) -> Result<Vec<LonLat>> {
    let items = payload
        .as_array()
        .ok_or_else(|| AnnotatorError::invalid("`coordinates` must be an array"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let pair = match item.as_array() {
                Some(pair) if pair.len() == 2 => pair,
                Some(pair) => {
                    return Err(element_error(
                        i,
                        format!("expected 2 components, got {}", pair.len()),
                    ))
                }
                None => return Err(element_error(i, "expected a [lon, lat] pair")),
            };
            let lon = finite_from_json(&pair[0]).map_err(|reason| element_error(i, reason))?;
            let lat = finite_from_json(&pair[1]).map_err(|reason| element_error(i, reason))?;
            Ok((lon, lat))
        })
        .collect()
}

/// Parse a comma-separated node list such as `1,2,3`.
pub fn parse_node_path(segment: &str) -> Result<Vec<NodeId>> {
    if segment.trim().is_empty() {
        return Ok(Vec::new());
    }
    segment
        .split(',')
        .enumerate()
        .map(|(i, part)| {
            part.trim()
                .parse::<NodeId>()
                .map_err(|_| element_error(i, format!("`{part}` is not a node id")))
        })
        .collect()
}

/// Parse a coordinate list such as `13.38,52.51;13.39,52.52`.
pub fn parse_coordinate_path(segment: &str) -> Result<Vec<LonLat>> {
    if segment.trim().is_empty() {
        return Ok(Vec::new());
    }
    segment
        .split(';')
        .enumerate()
        .map(|(i, pair)| {
            let parts: Vec<&str> = pair.split(',').collect();
            if parts.len() != 2 {
                return Err(element_error(
                    i,
                    format!("expected 2 components, got {}", parts.len()),
                ));
            }
            let lon = parse_finite(parts[0]).map_err(|reason| element_error(i, reason))?;
            let lat = parse_finite(parts[1]).map_err(|reason| element_error(i, reason))?;
            Ok((lon, lat))
        })
        .collect()
}

fn element_error(index: usize, reason: impl std::fmt::Display) -> AnnotatorError {
    AnnotatorError::invalid(format!("element {index}: {reason}"))
}

fn finite_from_json(value: &Value) -> std::result::Result<f64, String> {
    match value {
        Value::Null => Err("null is not a number".to_string()),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or_else(|| format!("{n} is not finite")),
        other => Err(format!("{other} is not a number")),
    }
}

fn node_id_from_json(value: &Value) -> std::result::Result<NodeId, String> {
    if let Some(id) = value.as_i64() {
        return Ok(id);
    }
    let f = finite_from_json(value)?;
    // Integral floats like `5.0` are accepted; anything else is not a node id.
    // `NodeId::MAX as f64` rounds up to 2^63, which is already out of range.
    if f.fract() == 0.0 && f >= NodeId::MIN as f64 && f < NodeId::MAX as f64 {
        Ok(f as NodeId)
    } else {
        Err(format!("{f} is not an integral node id"))
    }
}

fn parse_finite(s: &str) -> std::result::Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| format!("`{s}` is not a finite number"))
}

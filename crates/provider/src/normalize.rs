//! Field-path extraction over heterogeneous upstream response bodies.

use kite_core::config::RequestShape;
use serde_json::Value;

/// Candidate fields for image upstreams, in the order they are checked.
pub const IMAGE_PATHS: &[&str] = &["url", "imageUrl", "image_url", "data.0.url", "output", "image"];

const GENERIC_PATHS: &[&str] = &["response", "message", "result"];
const MESSAGES_PATHS: &[&str] = &["choices.0.message.content", "response", "message", "result"];
const GEMINI_PATHS: &[&str] = &["candidates.0.content.parts.0.text"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A dotted path into a JSON document. Numeric segments index arrays, so
/// `choices.0.message.content` reads `choices[0].message.content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<usize>() {
                Ok(i) => Segment::Index(i),
                Err(_) => Segment::Key(s.to_string()),
            })
            .collect();
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Walk the path. A numeric segment applied to an object is tried as a
    /// key, since some upstreams key objects by index strings.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let mut current = value;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Key(k), Value::Object(map)) => map.get(k)?,
                (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
                (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }
}

pub fn parse_paths<S: AsRef<str>>(raw: &[S]) -> Vec<FieldPath> {
    raw.iter().map(|p| FieldPath::parse(p.as_ref())).collect()
}

/// Default candidate list for an upstream's request shape.
pub fn default_paths(shape: RequestShape) -> Vec<FieldPath> {
    match shape {
        RequestShape::Query | RequestShape::Prompt => parse_paths(GENERIC_PATHS),
        RequestShape::Messages => parse_paths(MESSAGES_PATHS),
        RequestShape::Gemini => parse_paths(GEMINI_PATHS),
    }
}

/// Return the first usable value among `paths`, checked in order.
///
/// Null, missing and blank-string values are skipped. Numbers and booleans
/// are rendered as text; objects and arrays are not usable.
pub fn normalize(body: &Value, paths: &[FieldPath]) -> Option<String> {
    paths.iter().find_map(|path| usable(path.lookup(body)?))
}

fn usable(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

//! Typed input records. Only the linking identifiers are interpreted; every
//! other field stays in `payload` untouched.

use crate::config::{FieldNames, IntegrateOptions};
use crate::error::{RecordKind, ThreadError};
use rayon::prelude::*;
use serde_json::{Map, Number, Value};

/// A flat comment as exported by the crawler.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentRecord {
    pub comment_id: String,
    /// `None` for top-level comments (root sentinel, null, or absent).
    pub parent_id: Option<String>,
    pub owner_id: String,
    /// The full original object, identifiers included.
    pub payload: Map<String, Value>,
}

/// A content item (video, post, ...) that comments hang off.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub payload: Map<String, Value>,
}

/// Decimal text of a numeric id. Integral floats print without a fraction,
/// so `100.0`, `100` and `"100"` name the same comment.
pub(crate) fn number_text(n: &Number) -> String {
    // 2^53: beyond this an f64 no longer holds every integer exactly
    const EXACT: f64 = 9_007_199_254_740_992.0;
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= EXACT => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// Render an identifier as text. Crawlers emit ids as both strings and
/// numbers, so the two are treated as the same value.
pub fn id_text(v: &Value) -> Result<Option<String>, &'static str> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(number_text(n))),
        Value::Bool(_) => Err("boolean"),
        Value::Array(_) => Err("array"),
        Value::Object(_) => Err("object"),
    }
}

fn required_id(
    obj: &Map<String, Value>,
    field: &str,
    kind: RecordKind,
    index: usize,
    id: Option<&str>,
) -> Result<String, ThreadError> {
    let missing = || ThreadError::MissingField {
        kind,
        index,
        id: id.map(str::to_string),
        field: field.to_string(),
    };
    let raw = obj.get(field).ok_or_else(missing)?;
    match id_text(raw) {
        Ok(Some(s)) => Ok(s),
        Ok(None) => Err(missing()),
        Err(found) => Err(ThreadError::InvalidField {
            kind,
            index,
            id: id.map(str::to_string),
            field: field.to_string(),
            found,
        }),
    }
}

impl CommentRecord {
    /// Validate the linking fields of one raw comment.
    pub fn from_value(index: usize, v: Value, opts: &IntegrateOptions) -> Result<Self, ThreadError> {
        let kind = RecordKind::Comment;
        let Value::Object(payload) = v else {
            return Err(ThreadError::NotAnObject { kind, index });
        };
        let fields = &opts.fields;
        let comment_id = required_id(&payload, &fields.comment_id, kind, index, None)?;
        let owner_id = required_id(&payload, &fields.owner_id, kind, index, Some(&comment_id))?;

        let raw_parent = payload.get(&fields.parent_id);
        let parent_id = if opts.is_root_parent(raw_parent) {
            None
        } else {
            match raw_parent.map(id_text) {
                Some(Ok(p)) => p,
                Some(Err(found)) => {
                    return Err(ThreadError::InvalidField {
                        kind,
                        index,
                        id: Some(comment_id),
                        field: fields.parent_id.clone(),
                        found,
                    })
                }
                None => None,
            }
        };

        Ok(Self { comment_id, parent_id, owner_id, payload })
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl ContentItem {
    pub fn from_value(index: usize, v: Value, fields: &FieldNames) -> Result<Self, ThreadError> {
        let kind = RecordKind::Content;
        let Value::Object(payload) = v else {
            return Err(ThreadError::NotAnObject { kind, index });
        };
        let id = required_id(&payload, &fields.content_id, kind, index, None)?;
        Ok(Self { id, payload })
    }

    /// Metadata without the id field, optionally narrowed to `keep`
    /// (in `keep` order, absent keys skipped).
    pub fn metadata(&self, id_field: &str, keep: Option<&[String]>) -> Map<String, Value> {
        match keep {
            Some(keys) => keys
                .iter()
                .filter(|k| k.as_str() != id_field)
                .filter_map(|k| self.payload.get(k).map(|v| (k.clone(), v.clone())))
                .collect(),
            None => self
                .payload
                .iter()
                .filter(|(k, _)| k.as_str() != id_field)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Parse raw comments in parallel. Input order is kept, and on failure the
/// error for the lowest offending position is returned.
pub fn parse_comments(values: Vec<Value>, opts: &IntegrateOptions) -> Result<Vec<CommentRecord>, ThreadError> {
    let parsed: Vec<Result<CommentRecord, ThreadError>> = values
        .into_par_iter()
        .enumerate()
        .map(|(i, v)| CommentRecord::from_value(i, v, opts))
        .collect();
    parsed.into_iter().collect()
}

/// Parse raw content items in parallel, same ordering and error rules as `parse_comments`.
pub fn parse_contents(values: Vec<Value>, fields: &FieldNames) -> Result<Vec<ContentItem>, ThreadError> {
    let parsed: Vec<Result<ContentItem, ThreadError>> = values
        .into_par_iter()
        .enumerate()
        .map(|(i, v)| ContentItem::from_value(i, v, fields))
        .collect();
    parsed.into_iter().collect()
}

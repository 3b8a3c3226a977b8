use thiserror::Error;

/// Which input collection a record came from. Used to point validation errors
/// at the right file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Comment,
    Content,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Comment => f.write_str("comment"),
            RecordKind::Content => f.write_str("content item"),
        }
    }
}

/// Structural validation failures. Missing parents and unmatched owners are
/// not errors and never show up here.
#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("{kind} record #{index}{}: required field `{field}` is missing or null", id_suffix(.id))]
    MissingField {
        kind: RecordKind,
        index: usize,
        id: Option<String>,
        field: String,
    },

    #[error("{kind} record #{index}{}: field `{field}` must be a string or number, found {found}", id_suffix(.id))]
    InvalidField {
        kind: RecordKind,
        index: usize,
        id: Option<String>,
        field: String,
        found: &'static str,
    },

    #[error("{kind} record #{index} is not a JSON object")]
    NotAnObject { kind: RecordKind, index: usize },

    /// The built threads nest deeper than the output can hold.
    #[error("reply chains nest {depth} levels deep; at most {max} levels can be written")]
    ReplyChainTooDeep { depth: usize, max: usize },

    /// A provider payload lacks a field the normalized record cannot do without.
    #[error("{entity} payload: required field `{path}` is missing")]
    MissingProviderField { entity: &'static str, path: String },
}

fn id_suffix(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" (id {id})"),
        None => String::new(),
    }
}

impl ThreadError {
    /// Position of the offending record in its input collection, when there is one.
    pub fn index(&self) -> Option<usize> {
        match self {
            ThreadError::MissingField { index, .. }
            | ThreadError::InvalidField { index, .. }
            | ThreadError::NotAnObject { index, .. } => Some(*index),
            ThreadError::ReplyChainTooDeep { .. } | ThreadError::MissingProviderField { .. } => None,
        }
    }
}

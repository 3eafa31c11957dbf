use thiserror::Error;

/// Errors produced when constructing or validating foundation types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("missing identity key for namespace {0}")]
    MissingKey(&'static str),

    #[error("invalid identity key for namespace {namespace}: {reason}")]
    InvalidKey {
        namespace: &'static str,
        reason: String,
    },

    #[error("at least one identity key is required")]
    NoKeys,

    #[error("invalid category {value:?}: {reason}")]
    InvalidCategory { value: String, reason: String },

    #[error("invalid item id {value:?}: {reason}")]
    InvalidItemId { value: String, reason: String },

    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
}

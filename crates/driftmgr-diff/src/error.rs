use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unsupported value type at path {path}")]
    UnsupportedType { path: String },
}

use thiserror::Error;

/// Diagnostic raised by the `terragrunt.hcl` parser (spec §4.6: "parse errors
/// return a diagnostic naming the file and offending construct").
#[derive(Debug, Error)]
pub enum HclError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: hcl::error::Error,
    },

    #[error("{path}: malformed '{construct}' block: {message}")]
    MalformedConstruct {
        path: String,
        construct: String,
        message: String,
    },
}

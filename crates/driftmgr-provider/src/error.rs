use thiserror::Error;

/// Errors surfaced by a [`crate::ProviderAdapter`] (spec §4.1 "Failure
/// semantics (adapter level)").
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Fails the whole adapter (spec: "Credential unavailable -> fail the
    /// whole adapter with a distinct error kind").
    #[error("credentials unavailable for provider '{provider}': {reason}")]
    CredentialsUnavailable { provider: String, reason: String },

    #[error("http request to {provider} ({endpoint}) failed: {source}")]
    Http {
        provider: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned an error response ({status}) from {endpoint}: {body}")]
    ApiError {
        provider: String,
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("discovery cancelled")]
    Cancelled,

    #[error("internal provider error: {0}")]
    Internal(String),
}

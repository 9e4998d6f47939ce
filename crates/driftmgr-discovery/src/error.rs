use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no scheduled job with id {0}")]
    JobNotFound(Uuid),

    #[error("internal discovery error: {0}")]
    Internal(String),
}

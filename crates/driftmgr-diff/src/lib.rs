mod canon;
mod engine;
mod error;

pub use canon::content_hash;
pub use engine::{diff, DiffConfig};
pub use error::DiffError;

mod error;
mod memory;
mod record;
mod repository;

pub use error::StoreError;
pub use memory::InMemoryRepository;
pub use record::DriftRecord;
pub use repository::Repository;

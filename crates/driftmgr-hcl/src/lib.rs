mod eval;
mod loader;
mod walk;
pub mod error;

pub use error::HclError;
pub use loader::{load_terragrunt_file, parse_terragrunt_hcl};
pub use walk::find_terragrunt_files;

mod aws;
mod azure;
mod digitalocean;
mod driver;
mod error;
mod gcp;
mod local;
mod registry;

pub use aws::AwsAdapter;
pub use azure::AzureAdapter;
pub use digitalocean::DigitalOceanAdapter;
pub use driver::{DiscoveryContext, ProgressUpdate, ProviderAdapter};
pub use error::ProviderError;
pub use gcp::GcpAdapter;
pub use local::LocalAdapter;
pub use registry::Registry;

mod detector;
mod error;
mod events;
mod rules;
mod summary;

pub use detector::detect_drift;
pub use error::DriftError;
pub use events::{events_for_run, DriftEvent};
pub use rules::{DetectorConfig, SeverityRule};
pub use summary::{summarize, top_drifted_resources, trend_from_records, DriftSummary, TopDriftedResource, TrendPoint};

pub mod drift;
pub mod error;
pub mod resource;
pub mod terragrunt;

pub use drift::{AnalysisSummary, ChangeType, DriftChange, DriftResult, DriftType, Severity};
pub use error::DomainError;
pub use resource::Resource;
pub use terragrunt::{
    DependencyBlock, DependencyGraph, GenerateBlock, IncludeBlock, ModuleStatus,
    RemoteStateConfig, RemoteStateGenerate, TerragruntConfig, TerragruntModule,
};

pub mod config;
pub mod context;
pub mod controller;
pub mod error;

pub use config::PipelineConfig;
pub use context::ServiceContext;
pub use controller::{JobController, JobOutcome, JobSummary};
pub use error::PipelineError;

//! Repository implementations for database operations.

mod datapoint_repo;
mod job_repo;
mod model_repo;
mod pending_repo;
mod prediction_repo;

pub use datapoint_repo::{DatapointRepository, NewDatapoint, SeriesPoint};
pub use job_repo::JobRepository;
pub use model_repo::{ModelRepository, NewModel};
pub use pending_repo::PendingJobRepository;
pub use prediction_repo::PredictionRepository;

pub mod coordinator;
pub mod source;

pub use coordinator::{NodeReport, PipelineCoordinator};
pub use source::{MetricsSource, RawSample};

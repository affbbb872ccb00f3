mod mapper;
mod orchestrator;
mod step;
mod writer;

pub use mapper::MapperError;
pub use orchestrator::OrchestratorError;
pub use step::StepError;
pub use writer::WriterError;

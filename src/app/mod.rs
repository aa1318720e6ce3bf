mod orchestrator;
mod runtime;
mod shutdown;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::{ExtractionApp, ShutdownHandle};
pub use types::ShutdownReason;

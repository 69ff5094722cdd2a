//! Integration tests across the PCM helpers, the pipeline and the runner

pub mod e2e;
pub mod fixtures;

//! Terminal and CI reporting

pub mod workflow;

pub use workflow::WorkflowReporter;

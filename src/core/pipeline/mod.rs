// Core pipeline module - the locate/fetch/archive/label/report workflow.
// No HTTP or Google types in here; the infra layer implements the ports.

pub mod formatting;
pub mod pipeline_models;
pub mod pipeline_ports;
pub mod pipeline_service;

pub use pipeline_models::*;
pub use pipeline_ports::{
    BlobArchive, FileSource, ImageDescriber, ImageLabeler, ReportSink, ServiceError,
};
pub use pipeline_service::{AnalyzePipeline, PipelineError};

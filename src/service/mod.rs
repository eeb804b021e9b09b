//! # Services
//!
//! Multi-call workflows built on the [`crate::api`] collaborator traits:
//!
//! - [`EntityResolver`] turns a human ID (or full identifier) into a project
//!   and record
//! - [`collect_filtered`] and [`fan_out`] implement client-side date filtering
//!   for the list commands
//! - [`UploadPipeline`] uploads a file, creates its record and queues the map
//!   conversion

pub mod listing;
pub mod resolver;
pub mod upload;

pub use listing::{collect_filtered, fan_out, fan_out_projects, fetch_size_for, ProjectRecord};
pub use resolver::{EntityResolver, Resolution, ResolveError};
pub use upload::{
    Cleanup, ConversionStatus, PipelineSettings, PollPolicy, StageCause, StageError, StoredFile,
    UploadOutcome,
    UploadPipeline, UploadRequest, UploadStage,
};

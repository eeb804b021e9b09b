//! # Remote API
//!
//! Collaborator traits the services are written against, the wire models,
//! and the blocking HTTP implementation.
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`ResourceSearchClient`] | `EntityResolver`, date-filtered listing |
//! | [`UploadClient`] | `UploadPipeline` |
//! | [`DocumentClient`] | ticket and template document updates |

mod error;
mod http;
pub mod document;
pub mod models;

#[cfg(test)]
pub mod fake;

pub use error::ApiError;
pub use http::HttpApi;
pub use models::{Contract, Group, ListQuery, NewAudit, Page, SortField, UserInfo};

use serde_json::Value;

use crate::domain::{
    BlobRef, ConversionJob, ProjectHandle, RecordKind, RecordMetadata, ResourceRecord,
    UploadSession,
};

/// Search and lookup operations
pub trait ResourceSearchClient {
    /// Every project visible to the current user, including inactive and
    /// archival ones
    fn list_projects(&self) -> Result<Vec<ProjectHandle>, ApiError>;

    /// One batched search across `project_ids` for records whose identifier
    /// matches `fragment`, most recently modified first
    fn search_records_by_id_fragment(
        &self,
        kind: RecordKind,
        project_ids: &[String],
        fragment: &str,
    ) -> Result<Vec<ResourceRecord>, ApiError>;

    fn get_record(
        &self,
        kind: RecordKind,
        project_id: &str,
        remote_id: &str,
    ) -> Result<ResourceRecord, ApiError>;

    /// The most recently created records of `project_id`, newest first
    fn list_recent_records(
        &self,
        kind: RecordKind,
        project_id: &str,
        page_size: usize,
    ) -> Result<Vec<ResourceRecord>, ApiError>;
}

/// Chunked upload and record creation
pub trait UploadClient: ResourceSearchClient {
    /// Email of the user performing the upload
    fn actor(&self) -> Result<String, ApiError>;

    fn initiate_upload(&self, project_id: &str, file_name: &str) -> Result<UploadSession, ApiError>;

    fn transfer_chunk(
        &self,
        session: &UploadSession,
        index: usize,
        bytes: &[u8],
    ) -> Result<(), ApiError>;

    /// Marks the session done and returns the durable blob reference
    fn complete_upload(&self, session: &UploadSession) -> Result<BlobRef, ApiError>;

    /// Creates a file record for `blob`. The backend does not return the new
    /// record's identifier.
    fn create_record(
        &self,
        project_id: &str,
        metadata: &RecordMetadata,
        blob: &BlobRef,
    ) -> Result<(), ApiError>;

    fn group_name(&self, project_id: &str, group_id: &str) -> Result<String, ApiError>;

    /// Queues a map conversion; completion is never reported synchronously
    fn submit_conversion_job(&self, job: &ConversionJob) -> Result<(), ApiError>;

    fn delete_records(
        &self,
        project_id: &str,
        kind: RecordKind,
        ids: &[String],
    ) -> Result<(), ApiError>;
}

/// Raw document access
pub trait DocumentClient {
    fn get_document(&self, project_id: &str, doc_id: &str) -> Result<Value, ApiError>;

    fn put_document(&self, project_id: &str, doc_id: &str, doc: &Value) -> Result<(), ApiError>;
}

//! Domain models for the EdControls CLI
//!
//! Identifiers, records, date filters and upload bookkeeping, without any
//! I/O concerns.

mod human_id;
mod record;
mod date_filter;
mod upload;

pub use human_id::{looks_like_human_id, HumanId, HUMAN_ID_LEN};
pub use record::{split_compound_id, ProjectHandle, RecordKind, ResourceRecord, GLACIER_PROJECT_ID};
pub use date_filter::{
    parse_api_timestamp, parse_relative, parse_relative_at, DateFilterError, DateFilterSet,
};
pub use upload::{
    content_type_for, format_size, is_map_source, upload_name, AuditEntry, BlobRef, ConversionJob,
    RecordMetadata, UploadSession, UploadState,
};

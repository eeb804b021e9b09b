//! Upload session state and file helpers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extensions accepted as map sources
const MAP_SOURCE_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg"];

/// Builds the name a file is uploaded under: the base name with a
/// millisecond timestamp inserted before the extension.
///
/// `plan.pdf` uploaded at `1700000000000` becomes `plan-1700000000000.pdf`.
pub fn upload_name(file_name: &str, millis: i64) -> String {
    match file_name.rfind('.') {
        Some(idx) => format!("{}-{}{}", &file_name[..idx], millis, &file_name[idx..]),
        None => format!("{}-{}", file_name, millis),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// MIME type for a file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Returns true if the file can be converted to a map (PDF, PNG or JPG)
pub fn is_map_source(path: &Path) -> bool {
    extension(path).is_some_and(|ext| MAP_SOURCE_EXTENSIONS.contains(&ext.as_str()))
}

/// Formats a byte count with binary units: `512 B`, `1.5 KB`, `3.0 MB`
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < PREFIXES.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}

/// Progress of a chunked upload session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Initiated,
    Transferred,
    Completed,
}

/// One upload session, alive for a single pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Opaque token issued when the session was initiated
    pub token: String,
    pub target_filename: String,
    state: UploadState,
}

impl UploadSession {
    pub fn new(token: impl Into<String>, target_filename: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            target_filename: target_filename.into(),
            state: UploadState::Initiated,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn mark_transferred(&mut self) {
        self.state = UploadState::Transferred;
    }

    pub fn mark_completed(&mut self) {
        self.state = UploadState::Completed;
    }
}

/// Signed reference to a durable uploaded blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub url: String,
}

/// Audit-trail entry embedded in a created record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything needed to create a file record for an uploaded blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Name the record is shown (and later discovered) under
    pub display_name: String,
    /// Name the blob was uploaded under
    pub uploaded_name: String,
    pub content_type: String,
    pub size: u64,
    pub group_id: String,
    pub tags: Vec<String>,
    pub audit: AuditEntry,
}

/// Request to derive a map from a file record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub project_id: String,
    pub record_id: String,
    pub version_token: String,
    pub target_name: String,
    /// Human-readable group name, empty when it could not be resolved
    pub group_name: String,
}

//! Upload pipeline: local file to file record, optionally converted to a map
//!
//! ```text
//! 1 initiate  -> session token
//! 2 transfer  -> whole file as chunk 0
//! 3 complete  -> signed blob reference
//! 4 materialize -> create file record (no id returned)
//! 5 discover  -> poll recent files for the new record
//! 6 enrich    -> version token, group name (best effort)
//! 7 convert   -> conversion job queued
//! ```
//!
//! `files add` stops after stage 4, `maps add` runs all seven.
//!
//! The backend does not return the id of a created record, so a full run
//! first notes which files already carry the display name. Discover only
//! accepts a record outside that set, matched on the timestamped upload
//! name when the listing reports it. Compensation therefore only ever
//! deletes the record this run created.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::api::{ApiError, UploadClient};
use crate::domain::{
    content_type_for, upload_name, AuditEntry, BlobRef, ConversionJob, HumanId, RecordKind,
    RecordMetadata,
    ResourceRecord,
};

const AUDIT_ACTION: &str = "File uploaded via CLI";

/// One step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    Initiate,
    Transfer,
    Complete,
    Materialize,
    Discover,
    Enrich,
    Convert,
}

impl UploadStage {
    /// 1-based position in the pipeline
    pub fn number(&self) -> u8 {
        match self {
            UploadStage::Initiate => 1,
            UploadStage::Transfer => 2,
            UploadStage::Complete => 3,
            UploadStage::Materialize => 4,
            UploadStage::Discover => 5,
            UploadStage::Enrich => 6,
            UploadStage::Convert => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UploadStage::Initiate => "initiate",
            UploadStage::Transfer => "transfer",
            UploadStage::Complete => "complete",
            UploadStage::Materialize => "materialize",
            UploadStage::Discover => "discover",
            UploadStage::Enrich => "enrich",
            UploadStage::Convert => "convert",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (stage {} of 7)", self.name(), self.number())
    }
}

#[derive(Debug, Error)]
pub enum StageCause {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(
        "could not find uploaded file '{display_name}' \
         (searched {scanned} recent files, {attempts} attempts over {waited:?})"
    )]
    MaterializationTimedOut {
        display_name: String,
        scanned: usize,
        attempts: usize,
        waited: Duration,
    },

    #[error("file has no versionId, cannot convert to map")]
    MissingVersion,
}

/// What happened to the created record after a late failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    Removed,
    Failed(String),
    NotAttempted,
}

/// A pipeline failure, tagged with the stage that failed
#[derive(Debug, Error)]
#[error("upload {stage} failed")]
pub struct StageError {
    pub stage: UploadStage,
    #[source]
    pub cause: StageCause,
    /// Durable blob left behind with no record pointing at it
    pub orphaned_blob: Option<BlobRef>,
    pub cleanup: Cleanup,
}

impl StageError {
    fn new(stage: UploadStage, cause: impl Into<StageCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
            orphaned_blob: None,
            cleanup: Cleanup::NotAttempted,
        }
    }

    fn orphaning(mut self, blob: &BlobRef) -> Self {
        self.orphaned_blob = Some(blob.clone());
        self
    }
}

/// Bounded exponential backoff for discovering a created record.
///
/// The first delay doubles as the settle delay before the first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            timeout: Duration::from_secs(15),
        }
    }
}

impl PollPolicy {
    /// Delay before each attempt. Always at least one attempt; the total
    /// never exceeds the timeout past the first delay.
    pub fn schedule(&self) -> Vec<Duration> {
        let mut delays = vec![self.initial_delay];
        let mut total = self.initial_delay;
        let mut next = self.initial_delay.saturating_mul(2).min(self.max_delay);

        while !next.is_zero() && total + next <= self.timeout {
            delays.push(next);
            total += next;
            next = next.saturating_mul(2).min(self.max_delay);
        }
        delays
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub poll: PollPolicy,
    /// Recent files scanned per discovery attempt
    pub discover_page_size: usize,
    pub cleanup_on_failure: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            discover_page_size: 20,
            cleanup_on_failure: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub project_id: String,
    pub file_path: PathBuf,
    /// Defaults to the file name
    pub display_name: Option<String>,
    pub group_id: String,
    pub tags: Vec<String>,
}

impl UploadRequest {
    pub fn new(
        project_id: impl Into<String>,
        file_path: impl Into<PathBuf>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            file_path: file_path.into(),
            display_name: None,
            group_id: group_id.into(),
            tags: Vec::new(),
        }
    }

    fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn resolved_display_name(&self) -> String {
        self.display_name.clone().unwrap_or_else(|| self.file_name())
    }
}

/// Result of stages 1-4
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub display_name: String,
    pub uploaded_name: String,
    pub content_type: String,
    pub size: u64,
    pub blob: BlobRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Queued,
}

/// Result of a full run
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub record_id: String,
    pub human_id: HumanId,
    pub display_name: String,
    pub uploaded_name: String,
    pub size: u64,
    pub group_name: String,
    pub status: ConversionStatus,
}

pub struct UploadPipeline<'a, C: UploadClient + ?Sized> {
    client: &'a C,
    settings: PipelineSettings,
}

impl<'a, C: UploadClient + ?Sized> UploadPipeline<'a, C> {
    pub fn new(client: &'a C, settings: PipelineSettings) -> Self {
        Self { client, settings }
    }

    /// Stages 1-4: upload the file and create its record
    pub fn store(&self, request: &UploadRequest) -> Result<StoredFile, StageError> {
        let payload = read_file(&request.file_path)?;
        let display_name = request.resolved_display_name();
        let uploaded_name = upload_name(&request.file_name(), Utc::now().timestamp_millis());
        let size = payload.len() as u64;

        tracing::debug!(
            project_id = %request.project_id,
            %uploaded_name,
            size,
            "initiating upload"
        );
        let mut session = self
            .client
            .initiate_upload(&request.project_id, &uploaded_name)
            .map_err(|e| StageError::new(UploadStage::Initiate, e))?;

        self.client
            .transfer_chunk(&session, 0, &payload)
            .map_err(|e| StageError::new(UploadStage::Transfer, e))?;
        session.mark_transferred();

        let blob = self
            .client
            .complete_upload(&session)
            .map_err(|e| StageError::new(UploadStage::Complete, e))?;
        session.mark_completed();

        let materialize_err =
            |e: ApiError| StageError::new(UploadStage::Materialize, e).orphaning(&blob);
        let actor = self.client.actor().map_err(materialize_err)?;
        let metadata = RecordMetadata {
            display_name: display_name.clone(),
            uploaded_name: uploaded_name.clone(),
            content_type: content_type_for(&request.file_path).to_string(),
            size,
            group_id: request.group_id.clone(),
            tags: request.tags.clone(),
            audit: AuditEntry {
                action: AUDIT_ACTION.to_string(),
                actor,
                timestamp: Utc::now(),
            },
        };
        self.client
            .create_record(&request.project_id, &metadata, &blob)
            .map_err(materialize_err)?;

        Ok(StoredFile {
            display_name,
            uploaded_name,
            content_type: metadata.content_type,
            size,
            blob,
        })
    }

    /// All seven stages. The conversion is queued, never awaited.
    pub fn run(&self, request: &UploadRequest) -> Result<UploadOutcome, StageError> {
        let project_id = request.project_id.as_str();
        let earlier = self.listed_namesakes(project_id, &request.resolved_display_name())?;
        let stored = self.store(request)?;

        let record_id = self
            .discover(project_id, &stored, &earlier)
            .map_err(|e| e.orphaning(&stored.blob))?;
        tracing::debug!(project_id, %record_id, "discovered uploaded file");

        let result = self.enrich_and_convert(request, &stored, &record_id);
        match result {
            Ok(group_name) => Ok(UploadOutcome {
                human_id: HumanId::encode(&record_id),
                record_id,
                display_name: stored.display_name,
                uploaded_name: stored.uploaded_name,
                size: stored.size,
                group_name,
                status: ConversionStatus::Queued,
            }),
            Err(mut err) => {
                err.cleanup = self.compensate(project_id, &record_id);
                Err(err)
            }
        }
    }

    /// Files already listed under `display_name` before this run uploads
    /// anything. Discover never picks one of them.
    fn listed_namesakes(
        &self,
        project_id: &str,
        display_name: &str,
    ) -> Result<HashSet<String>, StageError> {
        let listed = self
            .client
            .list_recent_records(RecordKind::File, project_id, self.settings.discover_page_size)
            .map_err(|e| StageError::new(UploadStage::Initiate, e))?;

        Ok(listed
            .into_iter()
            .filter(|r| r.display_name == display_name)
            .map(|r| r.remote_id)
            .collect())
    }

    fn discover(
        &self,
        project_id: &str,
        stored: &StoredFile,
        earlier: &HashSet<String>,
    ) -> Result<String, StageError> {
        let display_name = stored.display_name.as_str();
        let schedule = self.settings.poll.schedule();
        let mut waited = Duration::ZERO;
        let mut scanned = 0;

        for (attempt, delay) in schedule.iter().enumerate() {
            thread::sleep(*delay);
            waited += *delay;

            let recent = self
                .client
                .list_recent_records(RecordKind::File, project_id, self.settings.discover_page_size)
                .map_err(|e| StageError::new(UploadStage::Discover, e))?;
            scanned = recent.len();

            if let Some(found) = recent.into_iter().find(|r| is_upload_of(r, stored, earlier)) {
                return Ok(found.remote_id);
            }
            tracing::debug!(
                attempt = attempt + 1,
                scanned,
                display_name,
                "uploaded file not listed yet"
            );
        }

        Err(StageError::new(
            UploadStage::Discover,
            StageCause::MaterializationTimedOut {
                display_name: display_name.to_string(),
                scanned,
                attempts: schedule.len(),
                waited,
            },
        ))
    }

    /// Stages 6 and 7; returns the group name sent with the job
    fn enrich_and_convert(
        &self,
        request: &UploadRequest,
        stored: &StoredFile,
        record_id: &str,
    ) -> Result<String, StageError> {
        let project_id = request.project_id.as_str();

        let record = self
            .client
            .get_record(RecordKind::File, project_id, record_id)
            .map_err(|e| StageError::new(UploadStage::Enrich, e))?;
        let version_token = record
            .version_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StageError::new(UploadStage::Enrich, StageCause::MissingVersion))?;

        let group_name = match self.client.group_name(project_id, &request.group_id) {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!(
                    group_id = %request.group_id,
                    error = %err,
                    "group name lookup failed"
                );
                String::new()
            }
        };

        let job = ConversionJob {
            project_id: project_id.to_string(),
            record_id: record_id.to_string(),
            version_token,
            target_name: stored.display_name.clone(),
            group_name: group_name.clone(),
        };
        self.client
            .submit_conversion_job(&job)
            .map_err(|e| StageError::new(UploadStage::Convert, e))?;

        Ok(group_name)
    }

    fn compensate(&self, project_id: &str, record_id: &str) -> Cleanup {
        if !self.settings.cleanup_on_failure {
            return Cleanup::NotAttempted;
        }

        match self
            .client
            .delete_records(project_id, RecordKind::File, &[record_id.to_string()])
        {
            Ok(()) => Cleanup::Removed,
            Err(err) => {
                tracing::warn!(
                    project_id,
                    record_id,
                    error = %err,
                    "cleanup of uploaded file failed"
                );
                Cleanup::Failed(err.to_string())
            }
        }
    }
}

/// True if `record` is the one this run created: not listed before the
/// upload, and carrying the timestamped upload name when the backend
/// reports one.
fn is_upload_of(record: &ResourceRecord, stored: &StoredFile, earlier: &HashSet<String>) -> bool {
    if earlier.contains(&record.remote_id) {
        return false;
    }
    match record.uploaded_name.as_deref() {
        Some(name) => name == stored.uploaded_name,
        None => record.display_name == stored.display_name,
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, StageError> {
    fs::read(path).map_err(|source| {
        StageError::new(
            UploadStage::Initiate,
            StageCause::Io {
                path: path.to_path_buf(),
                source,
            },
        )
    })
}

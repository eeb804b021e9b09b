//! In-memory backend for tests

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;

use super::error::ApiError;
use super::models::format_timestamp;
use super::{DocumentClient, ResourceSearchClient, UploadClient};
use crate::domain::{
    BlobRef, ConversionJob, ProjectHandle, RecordKind, RecordMetadata, ResourceRecord,
    UploadSession,
};

const SEARCH_PAGE_SIZE: usize = 10;

struct Stored {
    project_id: String,
    kind: RecordKind,
    record: ResourceRecord,
    /// Listing calls that must happen before the record shows up
    hidden_for: usize,
}

#[derive(Default)]
struct State {
    projects: Vec<ProjectHandle>,
    records: Vec<Stored>,
    documents: BTreeMap<(String, String), Value>,
    groups: HashMap<(String, String), String>,
    unreachable: HashSet<String>,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
    strip_compound: bool,
    hide_created: bool,
    created_hidden_for: usize,
    created_without_version: bool,
    created_without_uploaded_name: bool,
    next_id: u64,
    transfers: Vec<(String, usize, usize)>,
    conversions: Vec<ConversionJob>,
    deletions: Vec<(String, RecordKind, Vec<String>)>,
}

/// Backend double implementing every collaborator trait
#[derive(Default)]
pub struct FakeBackend {
    state: RefCell<State>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, id: &str, active: bool) -> Self {
        self.state
            .borrow_mut()
            .projects
            .push(ProjectHandle::new(id, id.to_uppercase(), active));
        self
    }

    pub fn with_archival_project(self, id: &str) -> Self {
        let mut project = ProjectHandle::new(id, id.to_uppercase(), true);
        project.is_archival_only = true;
        self.state.borrow_mut().projects.push(project);
        self
    }

    pub fn with_record(
        self,
        project_id: &str,
        kind: RecordKind,
        remote_id: &str,
        name: &str,
        created: &str,
        modified: &str,
    ) -> Self {
        let mut record = ResourceRecord::new(remote_id, name);
        record.created = created.to_string();
        record.modified = modified.to_string();
        self.state.borrow_mut().records.push(Stored {
            project_id: project_id.to_string(),
            kind,
            record,
            hidden_for: 0,
        });
        self
    }

    pub fn with_group(self, project_id: &str, group_id: &str, name: &str) -> Self {
        self.state
            .borrow_mut()
            .groups
            .insert((project_id.to_string(), group_id.to_string()), name.to_string());
        self
    }

    /// Search results carry no `project|id` compound identifier
    pub fn strip_compound_ids(self) -> Self {
        self.state.borrow_mut().strip_compound = true;
        self
    }

    /// Lookups and listings in `project_id` fail with a transport-like error
    pub fn unreachable(self, project_id: &str) -> Self {
        self.state.borrow_mut().unreachable.insert(project_id.to_string());
        self
    }

    /// Every call of `operation` fails
    pub fn failing(self, operation: &'static str) -> Self {
        self.state.borrow_mut().failing.insert(operation);
        self
    }

    /// Created records never show up in listings
    pub fn hide_created_records(self) -> Self {
        self.state.borrow_mut().hide_created = true;
        self
    }

    /// Created records show up only after `polls` listing calls
    pub fn created_visible_after(self, polls: usize) -> Self {
        self.state.borrow_mut().created_hidden_for = polls;
        self
    }

    pub fn created_without_version(self) -> Self {
        self.state.borrow_mut().created_without_version = true;
        self
    }

    /// Created records do not report the name they were uploaded under
    pub fn created_without_uploaded_name(self) -> Self {
        self.state.borrow_mut().created_without_uploaded_name = true;
        self
    }

    pub fn put_raw_document(&self, project_id: &str, doc_id: &str, doc: Value) {
        self.state
            .borrow_mut()
            .documents
            .insert((project_id.to_string(), doc_id.to_string()), doc);
    }

    /// Number of calls made to `operation`
    pub fn calls(&self, operation: &str) -> usize {
        self.state.borrow().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn conversions(&self) -> Vec<ConversionJob> {
        self.state.borrow().conversions.clone()
    }

    pub fn deletions(&self) -> Vec<(String, RecordKind, Vec<String>)> {
        self.state.borrow().deletions.clone()
    }

    /// `(session token, chunk index, byte count)` per transferred chunk
    pub fn transfers(&self) -> Vec<(String, usize, usize)> {
        self.state.borrow().transfers.clone()
    }

    pub fn records_in(&self, project_id: &str, kind: RecordKind) -> Vec<ResourceRecord> {
        self.state
            .borrow()
            .records
            .iter()
            .filter(|s| s.project_id == project_id && s.kind == kind)
            .map(|s| s.record.clone())
            .collect()
    }

    fn enter(&self, operation: &'static str) -> Result<(), ApiError> {
        let mut state = self.state.borrow_mut();
        *state.calls.entry(operation).or_default() += 1;
        if state.failing.contains(operation) {
            return Err(ApiError::Status {
                status: 500,
                message: format!("{} failed", operation),
            });
        }
        Ok(())
    }

    fn reachable(&self, project_id: &str) -> Result<(), ApiError> {
        if self.state.borrow().unreachable.contains(project_id) {
            return Err(ApiError::Status {
                status: 503,
                message: format!("{} unavailable", project_id),
            });
        }
        Ok(())
    }
}

fn not_found(kind: RecordKind, id: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("{} {} not found", kind, id),
    }
}

impl ResourceSearchClient for FakeBackend {
    fn list_projects(&self) -> Result<Vec<ProjectHandle>, ApiError> {
        self.enter("list_projects")?;
        Ok(self.state.borrow().projects.clone())
    }

    fn search_records_by_id_fragment(
        &self,
        kind: RecordKind,
        project_ids: &[String],
        fragment: &str,
    ) -> Result<Vec<ResourceRecord>, ApiError> {
        self.enter("search")?;
        let state = self.state.borrow();
        let reversed: String = fragment.chars().rev().collect();

        let mut hits: Vec<(&Stored, ResourceRecord)> = state
            .records
            .iter()
            .filter(|s| s.kind == kind && project_ids.contains(&s.project_id))
            .filter(|s| {
                let id = s.record.remote_id.to_lowercase();
                id.contains(fragment) || id.ends_with(&reversed)
            })
            .map(|s| {
                let mut record = s.record.clone();
                if !state.strip_compound {
                    record.compound_id = Some(format!("{}|{}", s.project_id, record.remote_id));
                }
                (s, record)
            })
            .collect();

        hits.sort_by(|a, b| b.0.record.modified.cmp(&a.0.record.modified));
        Ok(hits
            .into_iter()
            .map(|(_, record)| record)
            .take(SEARCH_PAGE_SIZE)
            .collect())
    }

    fn get_record(
        &self,
        kind: RecordKind,
        project_id: &str,
        remote_id: &str,
    ) -> Result<ResourceRecord, ApiError> {
        self.enter("get_record")?;
        self.reachable(project_id)?;
        self.state
            .borrow()
            .records
            .iter()
            .find(|s| {
                s.kind == kind && s.project_id == project_id && s.record.remote_id == remote_id
            })
            .map(|s| s.record.clone())
            .ok_or_else(|| not_found(kind, remote_id))
    }

    fn list_recent_records(
        &self,
        kind: RecordKind,
        project_id: &str,
        page_size: usize,
    ) -> Result<Vec<ResourceRecord>, ApiError> {
        self.enter("list_recent")?;
        self.reachable(project_id)?;

        let mut state = self.state.borrow_mut();
        let mut visible: Vec<ResourceRecord> = Vec::new();
        for stored in state
            .records
            .iter_mut()
            .filter(|s| s.kind == kind && s.project_id == project_id)
        {
            if stored.hidden_for > 0 {
                stored.hidden_for -= 1;
                continue;
            }
            visible.push(stored.record.clone());
        }

        // newest insert first among equal timestamps
        visible.reverse();
        visible.sort_by(|a, b| b.created.cmp(&a.created));
        visible.truncate(page_size);
        Ok(visible)
    }
}

impl UploadClient for FakeBackend {
    fn actor(&self) -> Result<String, ApiError> {
        self.enter("actor")?;
        Ok("tester@example.com".to_string())
    }

    fn initiate_upload(
        &self,
        project_id: &str,
        file_name: &str,
    ) -> Result<UploadSession, ApiError> {
        self.enter("initiate")?;
        self.reachable(project_id)?;
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        Ok(UploadSession::new(format!("upload-{}", state.next_id), file_name))
    }

    fn transfer_chunk(
        &self,
        session: &UploadSession,
        index: usize,
        bytes: &[u8],
    ) -> Result<(), ApiError> {
        self.enter("transfer")?;
        self.state
            .borrow_mut()
            .transfers
            .push((session.token.clone(), index, bytes.len()));
        Ok(())
    }

    fn complete_upload(&self, session: &UploadSession) -> Result<BlobRef, ApiError> {
        self.enter("complete")?;
        Ok(BlobRef {
            url: format!("https://blobs.test/{}/{}", session.token, session.target_filename),
        })
    }

    fn create_record(
        &self,
        project_id: &str,
        metadata: &RecordMetadata,
        _blob: &BlobRef,
    ) -> Result<(), ApiError> {
        self.enter("create_record")?;
        let mut state = self.state.borrow_mut();
        if state.hide_created {
            return Ok(());
        }

        state.next_id += 1;
        let remote_id = format!("{:032x}", 0xfeed_0000_u64 + state.next_id);
        let mut record = ResourceRecord::new(&remote_id, &metadata.display_name);
        record.created = format_timestamp(metadata.audit.timestamp);
        record.modified = record.created.clone();
        record.group_id = Some(metadata.group_id.clone());
        record.size = Some(metadata.size);
        record.tags = metadata.tags.clone();
        if !state.created_without_uploaded_name {
            record.uploaded_name = Some(metadata.uploaded_name.clone());
        }
        if !state.created_without_version {
            record.version_id = Some(format!("v-{}", remote_id));
        }

        let hidden_for = state.created_hidden_for;
        state.records.push(Stored {
            project_id: project_id.to_string(),
            kind: RecordKind::File,
            record,
            hidden_for,
        });
        Ok(())
    }

    fn group_name(&self, project_id: &str, group_id: &str) -> Result<String, ApiError> {
        self.enter("group_name")?;
        self.state
            .borrow()
            .groups
            .get(&(project_id.to_string(), group_id.to_string()))
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: format!("group {} not found", group_id),
            })
    }

    fn submit_conversion_job(&self, job: &ConversionJob) -> Result<(), ApiError> {
        self.enter("convert")?;
        self.state.borrow_mut().conversions.push(job.clone());
        Ok(())
    }

    fn delete_records(
        &self,
        project_id: &str,
        kind: RecordKind,
        ids: &[String],
    ) -> Result<(), ApiError> {
        self.enter("delete")?;
        let mut state = self.state.borrow_mut();
        state.records.retain(|s| {
            !(s.project_id == project_id && s.kind == kind && ids.contains(&s.record.remote_id))
        });
        state
            .deletions
            .push((project_id.to_string(), kind, ids.to_vec()));
        Ok(())
    }
}

impl DocumentClient for FakeBackend {
    fn get_document(&self, project_id: &str, doc_id: &str) -> Result<Value, ApiError> {
        self.enter("get_document")?;
        self.state
            .borrow()
            .documents
            .get(&(project_id.to_string(), doc_id.to_string()))
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: format!("document {} not found", doc_id),
            })
    }

    fn put_document(&self, project_id: &str, doc_id: &str, doc: &Value) -> Result<(), ApiError> {
        self.enter("put_document")?;
        self.put_raw_document(project_id, doc_id, doc.clone());
        Ok(())
    }
}

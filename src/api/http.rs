//! Blocking HTTP client for the EdControls API

use std::cell::OnceCell;
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::ACCEPT;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::error::ApiError;
use super::models::{
    bulk_delete_request, conversion_request, file_document, platform, record_from_document, str_at,
    CompleteResponse, Contract, CreateFileResponse, ErrorBody, Group, InitiateResponse, ListQuery,
    NewAudit, Page,
    ProjectsResponse, SearchPage, SortField, UserInfo, DEFAULT_PAGE_SIZE,
};
use super::{DocumentClient, ResourceSearchClient, UploadClient};
use crate::domain::{
    BlobRef, ConversionJob, ProjectHandle, RecordKind, RecordMetadata, ResourceRecord,
    UploadSession,
};

/// Page size of the batched ID search
const SEARCH_PAGE_SIZE: usize = 10;

const JSON: &str = "application/json";

/// Authenticated client for one user
pub struct HttpApi {
    http: Client,
    base_url: Url,
    token: String,
    email: OnceCell<String>,
    projects: OnceCell<Vec<ProjectHandle>>,
}

impl HttpApi {
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edcontrols-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
            email: OnceCell::new(),
            projects: OnceCell::new(),
        })
    }

    /// Uses a known email instead of looking it up on first use
    pub fn with_email(self, email: Option<String>) -> Self {
        if let Some(email) = email.filter(|e| !e.is_empty()) {
            let _ = self.email.set(email);
        }
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        accept: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%method, %url, "api request");
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, accept))
    }

    fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request.send()?;
        let status = response.status();
        let body = response.bytes()?;

        if status.is_client_error() || status.is_server_error() {
            let message = error_message(&body);
            tracing::debug!(status = status.as_u16(), %message, "api error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body.to_vec())
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        what: &'static str,
    ) -> Result<T, ApiError> {
        let body = self.execute(self.request(Method::GET, segments, JSON)?.query(query))?;
        decode(&body, what)
    }

    fn send_json(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        payload: &Value,
    ) -> Result<Vec<u8>, ApiError> {
        self.execute(self.request(method, segments, JSON)?.query(query).json(payload))
    }

    /// Fetches the current user and caches their email
    pub fn current_user(&self) -> Result<UserInfo, ApiError> {
        let user: UserInfo = self.get_json(&["api", "v1", "users", "me"], &[], "user info")?;
        let _ = self.email.set(user.email.clone());
        Ok(user)
    }

    /// Email of the current user, looked up once per process
    pub fn email(&self) -> Result<String, ApiError> {
        if let Some(email) = self.email.get() {
            return Ok(email.clone());
        }
        Ok(self.current_user()?.email)
    }

    /// Looks up one project by ID in the user's project list
    pub fn project(&self, project_id: &str) -> Result<ProjectHandle, ApiError> {
        self.list_projects()?
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| ApiError::NotFound {
                kind: "project",
                id: project_id.to_string(),
            })
    }

    /// Lists one page of records
    pub fn list(
        &self,
        kind: RecordKind,
        project_id: &str,
        query: &ListQuery,
    ) -> Result<Page, ApiError> {
        let mut params = query.to_params(kind);
        let segments: Vec<&str> = match kind {
            RecordKind::Ticket => vec!["api", "v2", "data", "tickets"],
            RecordKind::Audit => vec!["api", "v2", "data", "audits"],
            RecordKind::Map => vec!["api", "v2", "data", "maps"],
            RecordKind::Template => vec!["api", "v2", "data", "audittemplates"],
            RecordKind::File => vec!["api", "v2", "data", "file", project_id],
        };
        if kind != RecordKind::File {
            params.insert(0, ("database", project_id.to_string()));
        }

        let page: SearchPage = self.get_json(&segments, &params, "list response")?;
        Ok(Page {
            records: page
                .results
                .iter()
                .map(|doc| record_from_document(kind, doc))
                .collect(),
            hits: page.hits,
        })
    }

    /// Lists map, file or template groups
    pub fn list_groups(&self, kind: RecordKind, project_id: &str) -> Result<Vec<Group>, ApiError> {
        let size = ("size", DEFAULT_PAGE_SIZE.to_string());
        let page: SearchPage = match kind {
            RecordKind::Map => self.get_json(
                &["api", "v2", "data", "drawingGroups"],
                &[("database", project_id.to_string()), size],
                "map groups",
            )?,
            RecordKind::File => self.get_json(
                &["api", "v2", "data", "fileGroup", project_id],
                &[size],
                "file groups",
            )?,
            RecordKind::Template => self.get_json(
                &["api", "v2", "data", "audits", "templategroups"],
                &[("database", project_id.to_string()), size],
                "template groups",
            )?,
            _ => {
                return Err(ApiError::Unsupported {
                    operation: "group listing",
                    kind: kind.label(),
                })
            }
        };
        Ok(page.results.iter().map(Group::from_document).collect())
    }

    pub fn archive_files(
        &self,
        project_id: &str,
        ids: &[String],
        archive: bool,
    ) -> Result<(), ApiError> {
        let payload = json!({ "id": ids, "platform": platform() });
        self.send_json(
            Method::PUT,
            &["api", "v2", "data", "file", project_id, "archive"],
            &[("archive", archive.to_string())],
            &payload,
        )?;
        Ok(())
    }

    /// Creates an audit from a published template
    pub fn create_audit(
        &self,
        project_id: &str,
        template_id: &str,
        audit: &NewAudit,
    ) -> Result<ResourceRecord, ApiError> {
        let request = self.request(
            Method::POST,
            &[
                "api",
                "v2",
                "data",
                "projects",
                project_id,
                "audittemplates",
                template_id,
                "createAudit",
            ],
            JSON,
        )?;
        let body = self.execute(request.json(audit))?;
        let doc: Value = decode(&body, "created audit")?;
        Ok(record_from_document(RecordKind::Audit, &doc))
    }

    /// Fetches a contract from the clients database
    pub fn contract(&self, contract_id: &str) -> Result<Contract, ApiError> {
        self.get_json(&["api", "v1", "securedata", "clients", contract_id], &[], "contract")
    }

    /// Downloads the current version of a file record
    pub fn download_file(
        &self,
        project_id: &str,
        file: &ResourceRecord,
    ) -> Result<Vec<u8>, ApiError> {
        let version = file
            .version_id
            .as_deref()
            .ok_or_else(|| {
                ApiError::Rejected(format!("file {} has no downloadable version", file.remote_id))
            })?;

        let request = self.request(
            Method::GET,
            &[
                "api",
                "v2",
                "data",
                "file",
                project_id,
                file.remote_id.as_str(),
                version,
                file.display_name.as_str(),
                "downloadFile",
            ],
            "*/*",
        )?;
        self.execute(request)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &'static str) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::decode(what, e))
}

fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) if !parsed.message.is_empty() => parsed.message,
        _ => String::from_utf8_lossy(body).trim().to_string(),
    }
}

fn search_collection(kind: RecordKind) -> Option<&'static str> {
    match kind {
        RecordKind::Ticket => Some("tickets"),
        RecordKind::Audit => Some("audits"),
        RecordKind::Map => Some("maps"),
        RecordKind::File => Some("file"),
        RecordKind::Template => None,
    }
}

impl ResourceSearchClient for HttpApi {
    fn list_projects(&self) -> Result<Vec<ProjectHandle>, ApiError> {
        if let Some(projects) = self.projects.get() {
            return Ok(projects.clone());
        }

        let email = self.email()?;
        let response: ProjectsResponse = self.get_json(
            &["api", "v2", "licenseserver", "user", email.as_str(), "projects"],
            &[],
            "project list",
        )?;
        let projects: Vec<ProjectHandle> =
            response.projects.into_values().map(Into::into).collect();
        tracing::debug!(count = projects.len(), "projects loaded");

        let _ = self.projects.set(projects.clone());
        Ok(projects)
    }

    fn search_records_by_id_fragment(
        &self,
        kind: RecordKind,
        project_ids: &[String],
        fragment: &str,
    ) -> Result<Vec<ResourceRecord>, ApiError> {
        let collection = search_collection(kind).ok_or(ApiError::Unsupported {
            operation: "ID search",
            kind: kind.label(),
        })?;

        let payload = json!({
            "projects": project_ids,
            "searchById": fragment,
            "sortOrder": "DESC",
            "sortby": SortField::Modified.as_param(),
            "includeFields": ["couchDbId"],
        });
        let body = self.send_json(
            Method::POST,
            &["api", "v2", "data", collection, "search"],
            &[("size", SEARCH_PAGE_SIZE.to_string()), ("page", "0".to_string())],
            &payload,
        )?;

        let page: SearchPage = decode(&body, "search response")?;
        Ok(page
            .results
            .iter()
            .map(|doc| record_from_document(kind, doc))
            .collect())
    }

    fn get_record(
        &self,
        kind: RecordKind,
        project_id: &str,
        remote_id: &str,
    ) -> Result<ResourceRecord, ApiError> {
        let doc: Value = match kind {
            RecordKind::Ticket => self.get_json(
                &["api", "v2", "data", "tickets", project_id, remote_id],
                &[],
                "ticket",
            )?,
            _ => self.get_document(project_id, remote_id)?,
        };
        Ok(record_from_document(kind, &doc))
    }

    fn list_recent_records(
        &self,
        kind: RecordKind,
        project_id: &str,
        page_size: usize,
    ) -> Result<Vec<ResourceRecord>, ApiError> {
        let query = ListQuery {
            sort: Some(SortField::Created),
            size: page_size,
            ..ListQuery::default()
        };
        Ok(self.list(kind, project_id, &query)?.records)
    }
}

impl UploadClient for HttpApi {
    fn actor(&self) -> Result<String, ApiError> {
        self.email()
    }

    fn initiate_upload(
        &self,
        project_id: &str,
        file_name: &str,
    ) -> Result<UploadSession, ApiError> {
        let payload = json!({ "fileName": file_name, "database": project_id });
        let body =
            self.send_json(Method::POST, &["api", "v1", "fileUpload", "initiate"], &[], &payload)?;
        let response: InitiateResponse = decode(&body, "upload session")?;
        Ok(UploadSession::new(response.uuid, file_name))
    }

    fn transfer_chunk(
        &self,
        session: &UploadSession,
        index: usize,
        bytes: &[u8],
    ) -> Result<(), ApiError> {
        let form = Form::new()
            .part("chunk", Part::bytes(bytes.to_vec()).file_name("blob"))
            .text("fileName", session.target_filename.clone())
            .text("chunkIndex", index.to_string());

        let request = self
            .request(Method::POST, &["api", "v1", "fileUpload", "upload"], JSON)?
            .query(&[("uuid", session.token.as_str())])
            .multipart(form);
        self.execute(request)?;
        Ok(())
    }

    fn complete_upload(&self, session: &UploadSession) -> Result<BlobRef, ApiError> {
        let payload = json!({ "uuid": session.token, "fileName": session.target_filename });
        let body = self.send_json(
            Method::POST,
            &["api", "v1", "fileUpload", "uploadCompleted"],
            &[],
            &payload,
        )?;
        let response: CompleteResponse = decode(&body, "upload completion")?;
        Ok(BlobRef {
            url: response.signed_url,
        })
    }

    fn create_record(
        &self,
        project_id: &str,
        metadata: &RecordMetadata,
        blob: &BlobRef,
    ) -> Result<(), ApiError> {
        let project = self.project(project_id)?;
        let payload = file_document(&project.document_id, metadata);

        let body = self.send_json(
            Method::POST,
            &["api", "v2", "data", "file", project_id],
            &[
                ("fileUrl", blob.url.clone()),
                ("uploadedName", metadata.uploaded_name.clone()),
            ],
            &payload,
        )?;

        let response: CreateFileResponse = decode(&body, "file creation response")?;
        if response.code != 200 {
            return Err(ApiError::Rejected(format!(
                "file creation failed ({}): {}",
                response.code, response.message
            )));
        }
        Ok(())
    }

    fn group_name(&self, project_id: &str, group_id: &str) -> Result<String, ApiError> {
        let doc = self.get_document(project_id, group_id)?;
        Ok(str_at(&doc, &["name"]).unwrap_or_default().to_string())
    }

    fn submit_conversion_job(&self, job: &ConversionJob) -> Result<(), ApiError> {
        let actor = self.email()?;
        let project = self.project(&job.project_id)?;
        let payload = conversion_request(
            &job.project_id,
            &project.document_id,
            &actor,
            &job.target_name,
            &job.group_name,
            Utc::now(),
        );

        self.send_json(
            Method::POST,
            &[
                "api",
                "v2",
                "data",
                "tiler",
                job.project_id.as_str(),
                job.record_id.as_str(),
                "tileDocument",
            ],
            &[("versionId", job.version_token.clone())],
            &payload,
        )?;
        Ok(())
    }

    fn delete_records(
        &self,
        project_id: &str,
        kind: RecordKind,
        ids: &[String],
    ) -> Result<(), ApiError> {
        let (maps, files): (&[String], &[String]) = match kind {
            RecordKind::Map => (ids, &[]),
            RecordKind::File => (&[], ids),
            _ => {
                return Err(ApiError::Unsupported {
                    operation: "library delete",
                    kind: kind.label(),
                })
            }
        };

        let project = self.project(project_id)?;
        let payload =
            bulk_delete_request(project_id, &project.document_id, maps, files, Utc::now());
        self.send_json(Method::POST, &["api", "v1", "bulk", "library"], &[], &payload)?;
        Ok(())
    }
}

impl DocumentClient for HttpApi {
    fn get_document(&self, project_id: &str, doc_id: &str) -> Result<Value, ApiError> {
        self.get_json(&["api", "v1", "securedata", project_id, doc_id], &[], "document")
    }

    fn put_document(&self, project_id: &str, doc_id: &str, doc: &Value) -> Result<(), ApiError> {
        self.send_json(Method::PUT, &["api", "v1", "securedata", project_id, doc_id], &[], doc)?;
        Ok(())
    }
}

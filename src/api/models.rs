//! Wire models for the EdControls API
//!
//! Record documents differ per kind and carry many fields the CLI never
//! reads, so they are decoded as raw JSON and projected onto
//! [`ResourceRecord`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{split_compound_id, ProjectHandle, RecordKind, RecordMetadata, ResourceRecord};

/// Timestamp layout the backend writes
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Platform marker attached to every mutation
pub fn platform() -> Value {
    json!({
        "userInterface": "cli",
        "interfaceVersion": "1.0.0",
    })
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Channel identifier the backend uses to route progress notifications
pub fn channel_id(at: DateTime<Utc>, project_document_id: &str) -> String {
    format!("{}{}", at.timestamp_millis(), project_document_id)
}

/// Error body returned on 4xx/5xx
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Paginated list/search envelope
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchPage {
    pub size: u64,
    pub page: u64,
    pub hits: u64,
    pub results: Vec<Value>,
}

/// One page of records plus the server-side total
#[derive(Debug, Clone, Default, Serialize)]
pub struct Page {
    pub records: Vec<ResourceRecord>,
    pub hits: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonName {
    pub first_name: String,
    pub last_name: String,
}

/// Current user as returned by `/api/v1/users/me`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    pub email: String,
    pub name: PersonName,
    pub company_name: String,
    pub roles: Vec<String>,
    pub enabled: bool,
}

impl UserInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name.first_name, self.name.last_name)
            .trim()
            .to_string()
    }
}

/// Project entry from the license server
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireProject {
    pub project_id: String,
    pub project_name: String,
    pub couch_db_id: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub is_active: bool,
    /// null, a timestamp, or a bool
    pub archived: Value,
    pub is_glacier: bool,
    /// Contract document ID
    pub contract: String,
}

impl From<WireProject> for ProjectHandle {
    fn from(wire: WireProject) -> Self {
        let mut handle = ProjectHandle::new(wire.project_id, wire.project_name, wire.is_active);
        handle.is_archival_only |= wire.is_glacier;
        handle.document_id = wire.couch_db_id;
        handle.location = non_empty(wire.location);
        handle.start_date = non_empty(wire.start_date);
        handle.end_date = non_empty(wire.end_date);
        handle.contract = non_empty(wire.contract);
        handle.archived = match &wire.archived {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Bool(true) => Some("true".to_string()),
            _ => None,
        };
        handle
    }
}

/// `{"projects": {"<id>": {...}}}`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProjectsResponse {
    pub projects: BTreeMap<String, WireProject>,
}

#[derive(Debug, Deserialize)]
pub struct InitiateResponse {
    pub uuid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub signed_url: String,
}

/// Acknowledgement of a created file record; carries no identifier
#[derive(Debug, Deserialize)]
pub struct CreateFileResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Map or file group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub archived: bool,
}

impl Group {
    pub fn from_document(doc: &Value) -> Self {
        Self {
            id: document_id(doc),
            name: str_at(doc, &["name"]).unwrap_or_default().to_string(),
            archived: doc.get("archived").is_some_and(is_set),
        }
    }
}

/// Contract (client) document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Contract {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "contractActive")]
    pub active: bool,
    #[serde(rename = "pricePlan")]
    pub price_plan: String,
    /// Project document IDs
    pub projects: Vec<String>,
}

/// Overrides for an audit created from a template; unset fields come
/// from the template
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAudit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Field to sort listings by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortField {
    #[default]
    Created,
    Modified,
}

impl SortField {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortField::Created => "CREATIONDATE",
            SortField::Modified => "LASTMODIFIEDDATE",
        }
    }
}

/// Server-side filters for a list call
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub responsible: Option<String>,
    pub group_id: Option<String>,
    pub tag: Option<String>,
    pub template: Option<String>,
    pub published: Option<bool>,
    pub archived: bool,
    /// Include maps from every group (maps only)
    pub all: bool,
    pub sort: Option<SortField>,
    pub ascending: bool,
    pub page: usize,
    pub size: usize,
}

/// Default page size of list endpoints
pub const DEFAULT_PAGE_SIZE: usize = 50;

impl ListQuery {
    /// Query parameters for a list call of `kind`
    pub fn to_params(&self, kind: RecordKind) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if let Some(search) = &self.search {
            let key = match kind {
                RecordKind::Ticket | RecordKind::Audit => "searchByTitle",
                _ => "searchByName",
            };
            params.push((key, search.clone()));
        }
        if let Some(status) = &self.status {
            params.push(("status", status.clone()));
        }
        if let Some(responsible) = &self.responsible {
            let key = match kind {
                RecordKind::Audit => "searchByAuditor",
                _ => "searchByResponsible",
            };
            params.push((key, responsible.clone()));
        }
        if let Some(group) = &self.group_id {
            let key = match kind {
                RecordKind::Ticket => "groupId",
                _ => "groupid",
            };
            params.push((key, group.clone()));
        }
        if let Some(tag) = &self.tag {
            params.push(("tag", tag.clone()));
        }
        if let Some(template) = &self.template {
            params.push(("template", template.clone()));
        }
        if let Some(published) = self.published {
            params.push(("isPublished", published.to_string()));
        }
        if self.archived {
            params.push(("archived", "true".to_string()));
        }
        if self.all && kind == RecordKind::Map {
            params.push(("allMaps", "true".to_string()));
        }
        if let Some(sort) = self.sort {
            params.push(("sortby", sort.as_param().to_string()));
            let order = if self.ascending { "ASC" } else { "DESC" };
            params.push(("sortOrder", order.to_string()));
        }
        if self.page > 0 {
            params.push(("page", self.page.to_string()));
        }
        let size = if self.size > 0 { self.size } else { DEFAULT_PAGE_SIZE };
        params.push(("size", size.to_string()));

        params
    }
}

/// Returns true for a present, truthy JSON flag: non-empty string, true,
/// or any other non-null value
pub fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Looks up a nested string field
pub fn str_at<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = doc;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().filter(|s| !s.is_empty())
}

fn first_str(doc: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| str_at(doc, path))
        .map(str::to_string)
}

/// Backend identifier of a document: `couchDbId`, `_id`, or the tail of a
/// compound `id`
pub fn document_id(doc: &Value) -> String {
    if let Some(id) = first_str(doc, &[&["couchDbId"], &["_id"]]) {
        return id;
    }
    match str_at(doc, &["id"]) {
        Some(id) => split_compound_id(id).map_or(id, |(_, remote)| remote).to_string(),
        None => String::new(),
    }
}

fn size_of(doc: &Value) -> Option<u64> {
    match doc.get("size")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Projects a raw document onto the generic record shape
pub fn record_from_document(kind: RecordKind, doc: &Value) -> ResourceRecord {
    let display_name = match kind {
        RecordKind::Ticket => first_str(doc, &[&["content", "title"], &["title"]]),
        RecordKind::File => first_str(doc, &[&["fileName"], &["name"]]),
        _ => first_str(doc, &[&["name"]]),
    }
    .unwrap_or_default();

    let status = match kind {
        RecordKind::Ticket => first_str(doc, &[&["state", "state"], &["status"]]),
        RecordKind::Template => doc
            .get("isPublished")
            .and_then(Value::as_bool)
            .map(|published| if published { "published" } else { "draft" }.to_string()),
        _ => first_str(doc, &[&["status"]]),
    };

    let responsible = first_str(
        doc,
        &[&["participants", "responsible", "email"], &["participants", "responsible"]],
    );

    let tags = doc
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ResourceRecord {
        remote_id: document_id(doc),
        compound_id: str_at(doc, &["id"]).filter(|id| id.contains('|')).map(str::to_string),
        display_name,
        created: first_str(doc, &[&["dates", "creationDate"]]).unwrap_or_default(),
        modified: first_str(doc, &[&["dates", "lastModifiedDate"]]).unwrap_or_default(),
        status,
        responsible,
        due: first_str(doc, &[&["plan", "dueDate"], &["dates", "dueDate"]]),
        group_id: first_str(doc, &[&["groupId"], &["fileGroupID"], &["fileGroupId"]]),
        group_name: first_str(doc, &[&["groupName"]]),
        uploaded_name: first_str(doc, &[&["uploadedName"]]),
        version_id: first_str(doc, &[&["versionId"]]),
        size: size_of(doc),
        tags,
        archived: doc.get("archived").is_some_and(is_set),
        deleted: doc.get("deleted").is_some_and(is_set),
    }
}

/// Builds the document for a new file record
pub fn file_document(project_document_id: &str, metadata: &RecordMetadata) -> Value {
    let at = metadata.audit.timestamp;
    let now = format_timestamp(at);
    let actor = &metadata.audit.actor;

    json!({
        "fileName": metadata.display_name,
        "couchDbId": "",
        "attachments": [],
        "project": project_document_id,
        "type": "IB.EdBundle.Document.File",
        "content": {
            "author": actor,
            "lastModifier": actor,
        },
        "archived": null,
        "fileGroupID": metadata.group_id,
        "contentType": metadata.content_type,
        "thumbnail": null,
        "dates": {
            "creationDate": now,
            "lastModifiedDate": now,
        },
        "tags": metadata.tags,
        "deleted": null,
        "size": metadata.size.to_string(),
        "versions": null,
        "operation": [{
            "changedProperties": ["file Upload"],
            "oldValues": [""],
            "newValues": [metadata.display_name],
            "author": actor,
            "time": now,
            "summary": metadata.audit.action,
            "actionType": "created",
            "platform": platform(),
        }],
        "channelId": channel_id(at, project_document_id),
        "job": null,
        "time": at.format("%H:%M:%S").to_string(),
    })
}

/// Builds the tiler request that converts a file into a map
pub fn conversion_request(
    project_id: &str,
    project_document_id: &str,
    actor: &str,
    target_name: &str,
    group_name: &str,
    at: DateTime<Utc>,
) -> Value {
    json!({
        "sendStatus": {
            "channelId": channel_id(at, project_document_id),
            "time": at.format("%H:%M:%S").to_string(),
            "fileName": target_name,
        },
        "mapId": "",
        "fileStackUrl": null,
        "headers": {
            "from": actor,
            "to": format!("{}@edcontrols.nl", project_id),
            "subject": group_name,
            "date": format_timestamp(at),
        },
        "readyForTiler": true,
        "platform": platform(),
    })
}

/// Builds the bulk library delete request
pub fn bulk_delete_request(
    project_id: &str,
    project_document_id: &str,
    map_ids: &[String],
    file_ids: &[String],
    at: DateTime<Utc>,
) -> Value {
    json!({
        "channelId": channel_id(at, project_document_id),
        "mapList": map_ids,
        "fileList": file_ids,
        "time": at.format("%H:%M:%S").to_string(),
        "isFileDeletionEnabled": true,
        "database": project_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuditEntry;
    use chrono::TimeZone;

    #[test]
    fn ticket_document_projection() {
        let doc = json!({
            "id": "site-a|e4fcf23e74fe3a9c74dec23350b554cc",
            "content": {"title": "Leaking pipe"},
            "state": {"state": "started"},
            "dates": {
                "creationDate": "2026-01-10T08:00:00.000Z",
                "lastModifiedDate": "2026-01-12T09:30:00.000Z"
            },
            "participants": {"responsible": {"email": "jan@example.com"}},
            "plan": {"dueDate": "2026-02-01T00:00:00.000Z"},
            "tags": ["plumbing", 7],
            "archived": null
        });

        let record = record_from_document(RecordKind::Ticket, &doc);
        assert_eq!(record.remote_id, "e4fcf23e74fe3a9c74dec23350b554cc");
        assert_eq!(record.owning_project(), Some("site-a"));
        assert_eq!(record.display_name, "Leaking pipe");
        assert_eq!(record.status.as_deref(), Some("started"));
        assert_eq!(record.responsible.as_deref(), Some("jan@example.com"));
        assert_eq!(record.due.as_deref(), Some("2026-02-01T00:00:00.000Z"));
        assert_eq!(record.tags, vec!["plumbing"]);
        assert_eq!(record.created, "2026-01-10T08:00:00.000Z");
        assert!(!record.archived);
    }

    #[test]
    fn file_document_projection() {
        let doc = json!({
            "_id": "abc123def456",
            "name": "fallback",
            "fileName": "plan.pdf",
            "uploadedName": "plan-1700000000000.pdf",
            "size": "2048",
            "fileGroupID": "grp-1",
            "versionId": "v-1",
            "archived": "2026-01-01T00:00:00Z",
            "deleted": false
        });

        let record = record_from_document(RecordKind::File, &doc);
        assert_eq!(record.remote_id, "abc123def456");
        assert_eq!(record.compound_id, None);
        assert_eq!(record.display_name, "plan.pdf");
        assert_eq!(record.size, Some(2048));
        assert_eq!(record.group_id.as_deref(), Some("grp-1"));
        assert_eq!(record.version_id.as_deref(), Some("v-1"));
        assert_eq!(record.uploaded_name.as_deref(), Some("plan-1700000000000.pdf"));
        assert!(record.archived);
        assert!(!record.deleted);
        assert_eq!(record.lifecycle(), "archived");
    }

    #[test]
    fn template_status_from_published_flag() {
        let doc = json!({"couchDbId": "t1", "name": "Safety walk", "isPublished": true});
        let record = record_from_document(RecordKind::Template, &doc);
        assert_eq!(record.status.as_deref(), Some("published"));
    }

    #[test]
    fn truthy_flags() {
        assert!(!is_set(&Value::Null));
        assert!(!is_set(&json!(false)));
        assert!(!is_set(&json!("")));
        assert!(is_set(&json!(true)));
        assert!(is_set(&json!("2026-01-01")));
        assert!(is_set(&json!({"at": 1})));
    }

    #[test]
    fn wire_project_conversion() {
        let response: ProjectsResponse = serde_json::from_value(json!({
            "projects": {
                "site-a": {
                    "projectId": "site-a",
                    "projectName": "Site A",
                    "couchDbId": "doc-a",
                    "isActive": true,
                    "contract": "c-1"
                },
                "cold": {
                    "projectId": "cold",
                    "projectName": "Cold",
                    "isActive": true,
                    "isGlacier": true,
                    "archived": true
                }
            }
        }))
        .unwrap();

        let projects: Vec<ProjectHandle> =
            response.projects.into_values().map(Into::into).collect();
        assert_eq!(projects.len(), 2);

        let cold = &projects[0];
        assert_eq!(cold.id, "cold");
        assert!(cold.is_archival_only);
        assert_eq!(cold.archived.as_deref(), Some("true"));

        let site = &projects[1];
        assert_eq!(site.document_id, "doc-a");
        assert_eq!(site.contract.as_deref(), Some("c-1"));
        assert_eq!(cold.contract, None);
        assert!(site.is_fan_out_candidate());
    }

    #[test]
    fn list_params_per_kind() {
        let query = ListQuery {
            search: Some("pipe".into()),
            responsible: Some("jan@example.com".into()),
            group_id: Some("g1".into()),
            sort: Some(SortField::Modified),
            ..Default::default()
        };

        let ticket = query.to_params(RecordKind::Ticket);
        assert!(ticket.contains(&("searchByTitle", "pipe".to_string())));
        assert!(ticket.contains(&("searchByResponsible", "jan@example.com".to_string())));
        assert!(ticket.contains(&("groupId", "g1".to_string())));
        assert!(ticket.contains(&("sortby", "LASTMODIFIEDDATE".to_string())));
        assert!(ticket.contains(&("sortOrder", "DESC".to_string())));
        assert!(ticket.contains(&("size", "50".to_string())));

        let audit = query.to_params(RecordKind::Audit);
        assert!(audit.contains(&("searchByAuditor", "jan@example.com".to_string())));
        assert!(audit.contains(&("groupid", "g1".to_string())));

        let map = query.to_params(RecordKind::Map);
        assert!(map.contains(&("searchByName", "pipe".to_string())));
    }

    #[test]
    fn file_document_shape() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap();
        let metadata = RecordMetadata {
            display_name: "Ground floor".into(),
            uploaded_name: "plan-1.pdf".into(),
            content_type: "application/pdf".into(),
            size: 4096,
            group_id: "grp-1".into(),
            tags: vec![],
            audit: AuditEntry {
                action: "File uploaded via CLI".into(),
                actor: "jan@example.com".into(),
                timestamp: at,
            },
        };

        let doc = file_document("doc-a", &metadata);
        assert_eq!(doc["fileName"], "Ground floor");
        assert_eq!(doc["project"], "doc-a");
        assert_eq!(doc["size"], "4096");
        assert_eq!(doc["tags"], json!([]));
        assert_eq!(doc["time"], "10:30:00");
        assert_eq!(doc["dates"]["creationDate"], "2026-01-15T10:30:00.000Z");
        assert_eq!(doc["channelId"], format!("{}doc-a", at.timestamp_millis()));
        assert_eq!(doc["operation"][0]["author"], "jan@example.com");
        assert_eq!(doc["operation"][0]["platform"]["userInterface"], "cli");
    }

    #[test]
    fn conversion_request_shape() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap();
        let body = conversion_request(
            "site-a",
            "doc-a",
            "jan@example.com",
            "Ground floor",
            "Drawings",
            at,
        );
        assert_eq!(body["headers"]["to"], "site-a@edcontrols.nl");
        assert_eq!(body["headers"]["subject"], "Drawings");
        assert_eq!(body["sendStatus"]["fileName"], "Ground floor");
        assert_eq!(body["readyForTiler"], true);
    }
}

//! Remote record and project models
//!
//! Tickets, audits, maps and files share one generic shape on the client
//! side. Kind-specific fields the CLI shows are optional.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::human_id::HumanId;

/// Identifier of the long-term storage bucket that is never fanned out to
pub const GLACIER_PROJECT_ID: &str = "glacier_project_documents";

/// Kind of remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Ticket,
    Audit,
    Map,
    File,
    Template,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Ticket => "ticket",
            RecordKind::Audit => "audit",
            RecordKind::Map => "map",
            RecordKind::File => "file",
            RecordKind::Template => "template",
        }
    }

    /// Returns true if the backend offers a cross-project ID search for this kind
    pub fn is_searchable(&self) -> bool {
        !matches!(self, RecordKind::Template)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of a project as listed for the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHandle {
    /// Project ID, also the routing key for every record lookup
    pub id: String,
    pub name: String,
    pub is_active: bool,
    /// True for the long-term storage bucket
    pub is_archival_only: bool,
    /// Document ID of the project record itself
    #[serde(default)]
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<String>,
    /// Contract (client) the project is billed under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

impl ProjectHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_active: bool) -> Self {
        let id = id.into();
        Self {
            is_archival_only: id == GLACIER_PROJECT_ID,
            id,
            name: name.into(),
            is_active,
            document_id: String::new(),
            location: None,
            start_date: None,
            end_date: None,
            archived: None,
            contract: None,
        }
    }

    /// Returns true if this project takes part in an unscoped search
    pub fn is_fan_out_candidate(&self) -> bool {
        self.is_active && !self.is_archival_only
    }

    /// Display status: archival, archived, active or inactive
    pub fn status(&self) -> &'static str {
        if self.is_archival_only || self.archived.is_some() {
            "archived"
        } else if self.is_active {
            "active"
        } else {
            "inactive"
        }
    }
}

/// Generic remote record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Backend-assigned identifier
    pub remote_id: String,

    /// `project|remoteId`, returned by the cross-project search endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compound_id: Option<String>,

    pub display_name: String,

    /// Creation timestamp as sent by the backend (empty if absent)
    #[serde(default)]
    pub created: String,

    /// Last modification timestamp as sent by the backend (empty if absent)
    #[serde(default)]
    pub modified: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    /// Timestamped name the file was uploaded under (files)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_name: Option<String>,

    /// Download/version token (files)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub deleted: bool,
}

impl ResourceRecord {
    pub fn new(remote_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn human_id(&self) -> HumanId {
        HumanId::encode(&self.remote_id)
    }

    /// Owning project, when the backend returned a compound identifier
    pub fn owning_project(&self) -> Option<&str> {
        self.compound_id
            .as_deref()
            .and_then(split_compound_id)
            .map(|(project, _)| project)
    }

    /// Lifecycle label: deleted, archived or active
    pub fn lifecycle(&self) -> &'static str {
        if self.deleted {
            "deleted"
        } else if self.archived {
            "archived"
        } else {
            "active"
        }
    }
}

/// Splits `project|remoteId` on the first `|`
pub fn split_compound_id(compound: &str) -> Option<(&str, &str)> {
    compound.split_once('|')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_id_split_on_first_separator() {
        assert_eq!(split_compound_id("proj|abc"), Some(("proj", "abc")));
        assert_eq!(split_compound_id("proj|abc|def"), Some(("proj", "abc|def")));
        assert_eq!(split_compound_id("abc"), None);
    }

    #[test]
    fn owning_project_from_compound() {
        let mut record = ResourceRecord::new("abc", "A");
        assert_eq!(record.owning_project(), None);

        record.compound_id = Some("site-42|abc".to_string());
        assert_eq!(record.owning_project(), Some("site-42"));
    }

    #[test]
    fn glacier_is_never_a_fan_out_candidate() {
        let glacier = ProjectHandle::new(GLACIER_PROJECT_ID, "Glacier", true);
        assert!(glacier.is_archival_only);
        assert!(!glacier.is_fan_out_candidate());
        assert_eq!(glacier.status(), "archived");

        let inactive = ProjectHandle::new("old", "Old", false);
        assert!(!inactive.is_fan_out_candidate());
        assert_eq!(inactive.status(), "inactive");

        let active = ProjectHandle::new("site", "Site", true);
        assert!(active.is_fan_out_candidate());
        assert_eq!(active.status(), "active");
    }

    #[test]
    fn record_human_id() {
        let record = ResourceRecord::new("e4fcf23e74fe3a9c74dec23350b554cc", "Leak");
        assert_eq!(record.human_id().as_str(), "CC455B");
        assert_eq!(record.lifecycle(), "active");
    }
}

//! Listing and detail output shared by the record commands

use anyhow::Result;
use serde::Serialize;

use super::common::{or_dash, short_date};
use super::output::Output;
use super::session::Session;
use crate::api::{ListQuery, ResourceSearchClient};
use crate::domain::{format_size, DateFilterSet, HumanId, RecordKind, ResourceRecord};
use crate::service::{collect_filtered, fan_out, fan_out_projects, ProjectRecord};

/// Records of one listing, with or without a project column
pub enum Listing {
    Project(Vec<ResourceRecord>),
    FanOut(Vec<ProjectRecord>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Listing::Project(records) => records.len(),
            Listing::FanOut(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn views(&self) -> Vec<RecordView<'_>> {
        match self {
            Listing::Project(records) => records.iter().map(|r| RecordView::new(r, None)).collect(),
            Listing::FanOut(records) => records
                .iter()
                .map(|r| RecordView::new(&r.record, Some(r.project_id.as_str())))
                .collect(),
        }
    }
}

/// Record as shown in JSON output
#[derive(Serialize)]
pub struct RecordView<'a> {
    pub human_id: HumanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<&'a str>,
    #[serde(flatten)]
    pub record: &'a ResourceRecord,
}

impl<'a> RecordView<'a> {
    pub fn new(record: &'a ResourceRecord, project_id: Option<&'a str>) -> Self {
        Self {
            human_id: record.human_id(),
            project_id,
            record,
        }
    }
}

/// What a list command asks for
pub struct ListRequest {
    pub kind: RecordKind,
    pub query: ListQuery,
    pub filters: DateFilterSet,
    pub limit: usize,
    /// Include inactive projects in a fan-out
    pub all_projects: bool,
}

impl ListRequest {
    pub fn new(kind: RecordKind, query: ListQuery, filters: DateFilterSet, limit: usize) -> Self {
        Self {
            kind,
            query,
            filters,
            limit,
            all_projects: false,
        }
    }
}

/// Lists one project, date-filtering client-side when filters are set
pub fn list_project(
    session: &Session,
    output: &Output,
    project_id: &str,
    request: &ListRequest,
) -> Result<Vec<ResourceRecord>> {
    let kind = request.kind;
    if request.filters.has_date_filters() && request.query.page > 0 {
        output.warn("--page is ignored when date filters are set");
    }
    let records = collect_filtered(&request.filters, request.limit, |page, size| {
        let mut query = request.query.clone();
        query.page = backend_page(request, page);
        query.size = size;
        output.verbose_ctx(
            "list",
            &format!("Fetching {} page {} (size {})", kind, query.page, size),
        );
        session.api.list(kind, project_id, &query).map(|p| p.records)
    })?;
    Ok(records)
}

/// Backend page for the `index`-th fetch of a listing.
///
/// Filtered listings over-fetch, so their pages never line up with the
/// requested page and always scan from the first one.
fn backend_page(request: &ListRequest, index: usize) -> usize {
    if request.filters.has_date_filters() {
        index
    } else {
        request.query.page + index
    }
}

/// Lists across active projects, or all projects with `all_projects`
pub fn list_everywhere(
    session: &Session,
    output: &Output,
    request: &ListRequest,
) -> Result<Vec<ProjectRecord>> {
    let kind = request.kind;
    let projects = fan_out_projects(session.api.list_projects()?, request.all_projects);
    output.verbose_ctx("list", &format!("Searching {}s across {} projects", kind, projects.len()));

    Ok(fan_out(&projects, &request.filters, request.limit, |project, size| {
        let mut query = request.query.clone();
        query.size = size;
        session.api.list(kind, &project.id, &query).map(|p| p.records)
    }))
}

/// Single-project listing, or a fan-out when no project is given
pub fn list_scoped(
    session: &Session,
    output: &Output,
    project_id: Option<&str>,
    request: &ListRequest,
) -> Result<Listing> {
    match project_id {
        Some(project_id) => {
            let listing = list_project(session, output, project_id, request)?;
            Ok(Listing::Project(listing))
        }
        None => Ok(Listing::FanOut(list_everywhere(session, output, request)?)),
    }
}

fn title(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Ticket => "Ticket",
        RecordKind::Audit => "Audit",
        RecordKind::Map => "Map",
        RecordKind::File => "File",
        RecordKind::Template => "Template",
    }
}

/// Prints one record in detail
pub fn print_detail(output: &Output, kind: RecordKind, project_id: &str, record: &ResourceRecord) {
    if output.is_json() {
        output.data(&RecordView::new(record, Some(project_id)));
        return;
    }

    println!("{}: {} ({})", title(kind), record.human_id(), record.remote_id);
    println!("Project: {}", project_id);
    println!("Name: {}", record.display_name);
    if let Some(status) = &record.status {
        println!("Status: {}", status);
    }
    if let Some(responsible) = &record.responsible {
        println!("Responsible: {}", responsible);
    }
    println!("Created: {}", or_dash(Some(&record.created)));
    println!("Modified: {}", or_dash(Some(&record.modified)));
    if let Some(due) = &record.due {
        println!("Due: {}", short_date(due));
    }
    if let Some(group) = record.group_name.as_deref().or(record.group_id.as_deref()) {
        println!("Group: {}", group);
    }
    if let Some(size) = record.size {
        println!("Size: {}", format_size(size));
    }
    if let Some(version) = &record.version_id {
        println!("Version: {}", version);
    }
    if !record.tags.is_empty() {
        println!("Tags: {}", record.tags.join(", "));
    }
    println!("State: {}", record.lifecycle());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn request(page: usize, filters: DateFilterSet) -> ListRequest {
        let query = ListQuery {
            page,
            ..ListQuery::default()
        };
        ListRequest::new(RecordKind::Ticket, query, filters, 10)
    }

    #[test]
    fn unfiltered_listing_uses_requested_page() {
        let req = request(3, DateFilterSet::default());
        assert_eq!(backend_page(&req, 0), 3);
    }

    #[test]
    fn filtered_listing_scans_from_first_page() {
        let filters = DateFilterSet {
            created_after: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            ..DateFilterSet::default()
        };
        let req = request(3, filters);
        assert_eq!(backend_page(&req, 0), 0);
        assert_eq!(backend_page(&req, 2), 2);
    }
}

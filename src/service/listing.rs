//! Client-side date filtering for list endpoints
//!
//! The list endpoints have no date range parameters. When date filters are
//! set the caller over-fetches, keeps records passing the filter and pages
//! on until the limit is met or a short page signals the end.

use std::fmt::Display;

use serde::Serialize;

use crate::domain::{DateFilterSet, ProjectHandle, ResourceRecord};

pub const OVERFETCH_FACTOR: usize = 3;

/// Ceiling on the page size requested while date filtering
pub const MAX_FETCH_SIZE: usize = 200;

/// Pages scanned before giving up on filling the limit
const MAX_PAGES: usize = 50;

/// Page size to request for `limit` wanted records
pub fn fetch_size_for(limit: usize, filters: &DateFilterSet) -> usize {
    if !filters.has_date_filters() {
        return limit.max(1);
    }
    limit.saturating_mul(OVERFETCH_FACTOR).clamp(1, MAX_FETCH_SIZE)
}

/// Collects up to `limit` records passing `filters`.
///
/// `fetch(page, size)` returns one page of records. Without date filters a
/// single page of `limit` records is requested.
pub fn collect_filtered<E, F>(
    filters: &DateFilterSet,
    limit: usize,
    mut fetch: F,
) -> Result<Vec<ResourceRecord>, E>
where
    F: FnMut(usize, usize) -> Result<Vec<ResourceRecord>, E>,
{
    if limit == 0 {
        return Ok(Vec::new());
    }

    if !filters.has_date_filters() {
        let mut records = fetch(0, limit)?;
        records.truncate(limit);
        return Ok(records);
    }

    let size = fetch_size_for(limit, filters);
    let mut kept = Vec::new();

    for page in 0..MAX_PAGES {
        let batch = fetch(page, size)?;
        let exhausted = batch.len() < size;
        tracing::debug!(page, size, fetched = batch.len(), kept = kept.len(), "filtered page");

        for record in batch {
            if filters.matches_dates(&record.created, &record.modified) {
                kept.push(record);
                if kept.len() == limit {
                    return Ok(kept);
                }
            }
        }

        if exhausted {
            break;
        }
    }

    Ok(kept)
}

/// A record listed during a fan-out, tagged with its project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectRecord {
    pub project_id: String,
    pub project_name: String,
    #[serde(flatten)]
    pub record: ResourceRecord,
}

/// Projects a fan-out listing visits. The archival bucket is never included.
pub fn fan_out_projects(
    projects: Vec<ProjectHandle>,
    include_inactive: bool,
) -> Vec<ProjectHandle> {
    projects
        .into_iter()
        .filter(|p| !p.is_archival_only && (include_inactive || p.is_active))
        .collect()
}

/// Lists records across `projects`, one project at a time, until `limit`
/// records passing `filters` are collected.
///
/// A project whose listing fails is skipped with a warning.
pub fn fan_out<E, F>(
    projects: &[ProjectHandle],
    filters: &DateFilterSet,
    limit: usize,
    mut fetch: F,
) -> Vec<ProjectRecord>
where
    E: Display,
    F: FnMut(&ProjectHandle, usize) -> Result<Vec<ResourceRecord>, E>,
{
    let mut collected = Vec::new();
    if limit == 0 {
        return collected;
    }

    let size = fetch_size_for(limit, filters);
    for project in projects {
        let records = match fetch(project, size) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(project_id = %project.id, error = %err, "skipping project");
                continue;
            }
        };

        for record in records {
            if !filters.matches_dates(&record.created, &record.modified) {
                continue;
            }
            collected.push(ProjectRecord {
                project_id: project.id.clone(),
                project_name: project.name.clone(),
                record,
            });
            if collected.len() >= limit {
                return collected;
            }
        }
    }

    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, created: &str) -> ResourceRecord {
        let mut r = ResourceRecord::new(id, id);
        r.created = created.to_string();
        r.modified = created.to_string();
        r
    }

    fn since_march() -> DateFilterSet {
        DateFilterSet {
            created_after: Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
            ..DateFilterSet::default()
        }
    }

    /// Pages over `all` the way a list endpoint would
    fn pager(
        all: &[ResourceRecord],
    ) -> impl FnMut(usize, usize) -> Result<Vec<ResourceRecord>, String> + '_ {
        move |page, size| Ok(all.iter().skip(page * size).take(size).cloned().collect())
    }

    #[test]
    fn fetch_size_overfetches_with_ceiling() {
        assert_eq!(fetch_size_for(50, &DateFilterSet::default()), 50);
        assert_eq!(fetch_size_for(10, &since_march()), 30);
        assert_eq!(fetch_size_for(100, &since_march()), MAX_FETCH_SIZE);
        assert_eq!(fetch_size_for(0, &since_march()), 1);
    }

    #[test]
    fn unfiltered_listing_is_one_page() {
        let all: Vec<_> = (0..10).map(|i| record(&format!("r{}", i), "2026-01-01")).collect();
        let mut calls = 0;
        let mut inner = pager(&all);
        let got = collect_filtered(&DateFilterSet::default(), 4, |page, size| {
            calls += 1;
            inner(page, size)
        })
        .unwrap();

        assert_eq!(got.len(), 4);
        assert_eq!(calls, 1);
    }

    #[test]
    fn pages_until_limit_met() {
        // every third record is recent enough
        let all: Vec<_> = (0..30)
            .map(|i| {
                let created =
                    if i % 3 == 0 { "2026-03-10T00:00:00Z" } else { "2026-01-10T00:00:00Z" };
                record(&format!("r{}", i), created)
            })
            .collect();

        let mut pages = Vec::new();
        let mut inner = pager(&all);
        let got = collect_filtered(&since_march(), 4, |page, size| {
            pages.push((page, size));
            inner(page, size)
        })
        .unwrap();

        let ids: Vec<_> = got.iter().map(|r| r.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["r0", "r3", "r6", "r9"]);
        assert_eq!(pages, vec![(0, 12)]);
    }

    #[test]
    fn short_page_stops_paging() {
        let all = vec![
            record("old", "2026-01-10T00:00:00Z"),
            record("new", "2026-03-10T00:00:00Z"),
            record("undated", ""),
        ];

        let mut calls = 0;
        let mut inner = pager(&all);
        let got = collect_filtered(&since_march(), 5, |page, size| {
            calls += 1;
            inner(page, size)
        })
        .unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].remote_id, "new");
        assert_eq!(calls, 1);
    }

    #[test]
    fn fetch_error_propagates() {
        let result = collect_filtered(&since_march(), 5, |_, _| {
            Err::<Vec<ResourceRecord>, _>("boom".to_string())
        });
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn zero_limit_fetches_nothing() {
        let got = collect_filtered(
            &since_march(),
            0,
            |_, _| -> Result<Vec<ResourceRecord>, String> { panic!("must not fetch") },
        )
        .unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn fan_out_project_selection() {
        let mut glacier = ProjectHandle::new("glacier_project_documents", "Glacier", true);
        glacier.is_archival_only = true;
        let projects = vec![
            ProjectHandle::new("a", "A", true),
            ProjectHandle::new("b", "B", false),
            glacier,
        ];

        let active: Vec<_> =
            fan_out_projects(projects.clone(), false).into_iter().map(|p| p.id).collect();
        assert_eq!(active, vec!["a"]);

        let all: Vec<_> = fan_out_projects(projects, true).into_iter().map(|p| p.id).collect();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[test]
    fn fan_out_skips_failing_projects_and_stops_at_limit() {
        let projects = vec![
            ProjectHandle::new("a", "A", true),
            ProjectHandle::new("down", "Down", true),
            ProjectHandle::new("b", "B", true),
            ProjectHandle::new("c", "C", true),
        ];

        let mut visited = Vec::new();
        let got = fan_out(&projects, &DateFilterSet::default(), 3, |project, _| {
            visited.push(project.id.clone());
            match project.id.as_str() {
                "down" => Err("unavailable"),
                id => Ok(vec![record(&format!("{}1", id), ""), record(&format!("{}2", id), "")]),
            }
        });

        let tagged: Vec<_> = got
            .iter()
            .map(|r| (r.project_id.as_str(), r.record.remote_id.as_str()))
            .collect();
        assert_eq!(tagged, vec![("a", "a1"), ("a", "a2"), ("b", "b1")]);
        assert_eq!(got[0].project_name, "A");
        assert_eq!(visited, vec!["a", "down", "b"]);
    }

    #[test]
    fn fan_out_applies_date_filter_per_project() {
        let projects = vec![ProjectHandle::new("a", "A", true), ProjectHandle::new("b", "B", true)];
        let got = fan_out(&projects, &since_march(), 10, |project, size| {
            assert_eq!(size, 30);
            Ok::<_, String>(match project.id.as_str() {
                "a" => vec![record("a-old", "2026-02-01T00:00:00Z")],
                _ => vec![record("b-new", "2026-03-02T00:00:00Z")],
            })
        });

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].record.remote_id, "b-new");
    }
}

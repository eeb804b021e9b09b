//! Cross-project lookup of records by human ID or full identifier
//!
//! A human ID says nothing about which project a record lives in. The
//! resolver issues one batched search across every candidate project,
//! re-derives the human ID of each hit to weed out loose matches, and
//! recovers the owning project either from the compound `project|id` the
//! search returns or, failing that, by probing each candidate in turn.

use std::collections::HashSet;

use thiserror::Error;

use crate::api::{ApiError, ResourceSearchClient};
use crate::domain::{looks_like_human_id, HumanId, RecordKind, ResourceRecord};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Where a record lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub project_id: String,
    pub remote_id: String,
    /// Number of distinct records in the scanned page sharing the requested
    /// human ID. Anything above 1 means the first match was picked.
    pub ambiguous_matches: usize,
}

impl Resolution {
    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous_matches > 1
    }
}

pub struct EntityResolver<'a, C: ResourceSearchClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ResourceSearchClient + ?Sized> EntityResolver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Projects searched for a lookup: the scope alone, or every active,
    /// non-archival project
    pub fn candidate_projects(&self, scope: Option<&str>) -> Result<Vec<String>, ApiError> {
        if let Some(project) = scope {
            return Ok(vec![project.to_string()]);
        }

        Ok(self
            .client
            .list_projects()?
            .into_iter()
            .filter(|p| p.is_fan_out_candidate())
            .map(|p| p.id)
            .collect())
    }

    /// Resolves a human ID within `scope`, or across all active projects
    pub fn resolve(
        &self,
        kind: RecordKind,
        human_id: &HumanId,
        scope: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        let not_found = || ResolveError::NotFound {
            kind,
            id: human_id.to_string(),
        };

        if !kind.is_searchable() {
            return Err(not_found());
        }

        let candidates = self.candidate_projects(scope)?;
        if candidates.is_empty() {
            return Err(not_found());
        }

        let hits = self
            .client
            .search_records_by_id_fragment(kind, &candidates, &human_id.search_fragment())?;
        let matching: Vec<&ResourceRecord> =
            hits.iter().filter(|r| human_id.matches(&r.remote_id)).collect();
        tracing::debug!(
            %kind,
            %human_id,
            hits = hits.len(),
            matching = matching.len(),
            "id search"
        );

        let distinct = distinct_records(&matching);
        if distinct > 1 {
            tracing::warn!(
                %kind,
                %human_id,
                candidates = distinct,
                "human ID is ambiguous, using the most recently modified match"
            );
        }

        for record in matching {
            if let Some(project_id) = self.owning_project(kind, record, &candidates) {
                return Ok(Resolution {
                    project_id,
                    remote_id: record.remote_id.clone(),
                    ambiguous_matches: distinct,
                });
            }
        }

        Err(not_found())
    }

    /// Locates a record from user input: a human ID, or a full identifier.
    ///
    /// A full identifier with a scope is taken as-is. Without a scope it is
    /// searched for by exact identifier and, when the search does not reveal
    /// the project, looked up in every candidate project.
    pub fn locate(
        &self,
        kind: RecordKind,
        identifier: &str,
        scope: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        let identifier = identifier.trim();
        if looks_like_human_id(identifier) {
            return self.resolve(kind, &HumanId::from_input(identifier), scope);
        }

        if let Some(project_id) = scope {
            return Ok(Resolution {
                project_id: project_id.to_string(),
                remote_id: identifier.to_string(),
                ambiguous_matches: 1,
            });
        }

        let candidates = self.candidate_projects(None)?;
        let hits = self
            .client
            .search_records_by_id_fragment(kind, &candidates, identifier)?;

        let exact = hits.iter().find(|r| r.remote_id == identifier);
        let project_id = match exact.and_then(ResourceRecord::owning_project) {
            Some(project_id) => Some(project_id.to_string()),
            None => self.find_owner(kind, identifier, &candidates),
        };

        project_id
            .map(|project_id| Resolution {
                project_id,
                remote_id: identifier.to_string(),
                ambiguous_matches: 1,
            })
            .ok_or_else(|| ResolveError::NotFound {
                kind,
                id: identifier.to_string(),
            })
    }

    fn owning_project(
        &self,
        kind: RecordKind,
        record: &ResourceRecord,
        candidates: &[String],
    ) -> Option<String> {
        match record.owning_project() {
            Some(project_id) => Some(project_id.to_string()),
            None => self.find_owner(kind, &record.remote_id, candidates),
        }
    }

    /// Asks each candidate project for the record until one has it.
    /// A project whose lookup fails for any reason is skipped.
    fn find_owner(
        &self,
        kind: RecordKind,
        remote_id: &str,
        candidates: &[String],
    ) -> Option<String> {
        candidates.iter().find_map(|project_id| {
            match self.client.get_record(kind, project_id, remote_id) {
                Ok(_) => Some(project_id.clone()),
                Err(err) => {
                    tracing::debug!(
                        %kind,
                        remote_id,
                        project_id = %project_id,
                        error = %err,
                        "record not in project"
                    );
                    None
                }
            }
        })
    }
}

fn distinct_records(records: &[&ResourceRecord]) -> usize {
    records
        .iter()
        .map(|r| (r.owning_project(), r.remote_id.as_str()))
        .collect::<HashSet<_>>()
        .len()
}

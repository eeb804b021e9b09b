//! Arguments and formatting shared by the resource commands

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use super::output::Output;
use crate::api::models::DEFAULT_PAGE_SIZE;
use crate::api::{Group, ListQuery, SortField};
use crate::domain::{parse_relative_at, DateFilterSet};

const WHEN_HELP: &str = "e.g. 3d, 2w, 1mo, 1y, or 2026-01-15";

/// Client-side date range filters
#[derive(Args, Debug, Clone, Default)]
pub struct DateFilterArgs {
    /// Only records created after this time (e.g. 3d, 2w, 1mo, 1y, or 2026-01-15)
    #[arg(long, value_name = "WHEN")]
    pub created_after: Option<String>,

    /// Only records created before this time
    #[arg(long, value_name = "WHEN")]
    pub created_before: Option<String>,

    /// Only records modified after this time
    #[arg(long, value_name = "WHEN")]
    pub modified_after: Option<String>,

    /// Only records modified before this time
    #[arg(long, value_name = "WHEN")]
    pub modified_before: Option<String>,
}

impl DateFilterArgs {
    /// Parses every set flag against one reference time
    pub fn to_filters(&self) -> Result<DateFilterSet> {
        let now = Utc::now();
        let parse = |flag: &str, value: &Option<String>| {
            value
                .as_deref()
                .map(|v| parse_relative_at(v, now))
                .transpose()
                .with_context(|| format!("--{}", flag))
        };

        Ok(DateFilterSet {
            created_after: parse("created-after", &self.created_after)?,
            created_before: parse("created-before", &self.created_before)?,
            modified_after: parse("modified-after", &self.modified_after)?,
            modified_before: parse("modified-before", &self.modified_before)?,
        })
    }
}

/// Paging and ordering of a list command
#[derive(Args, Debug, Clone)]
pub struct PagingArgs {
    /// Maximum number of records to return
    #[arg(long, short = 'l', default_value_t = DEFAULT_PAGE_SIZE)]
    pub limit: usize,

    /// Page number (0-based, ignored when date filters are set)
    #[arg(long, short = 'p', default_value_t = 0)]
    pub page: usize,

    /// Sort by field
    #[arg(long, short = 'o', value_enum, default_value_t = SortField::Created)]
    pub sort: SortField,

    /// Sort in ascending order (oldest first)
    #[arg(long)]
    pub asc: bool,
}

impl PagingArgs {
    /// Applies paging and ordering to a query
    pub fn apply(&self, query: &mut ListQuery) {
        query.sort = Some(self.sort);
        query.ascending = self.asc;
        query.page = self.page;
        query.size = self.limit;
    }
}

/// Shortens `s` to `max` characters, ending in `...` when cut
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// `YYYY-MM-DD` part of a backend timestamp, or `-`
pub fn short_date(raw: &str) -> String {
    if raw.is_empty() {
        return "-".to_string();
    }
    raw.chars().take(10).collect()
}

pub fn or_dash(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "-",
    }
}

/// Footer under a listing
pub fn total_line(count: usize, limit: usize, noun: &str) -> String {
    if count >= limit {
        format!(
            "Showing {} {} (limit reached). Use -l to show more, or narrow with filters ({}).",
            count, noun, WHEN_HELP
        )
    } else {
        format!("Total: {} {}", count, noun)
    }
}

/// Prints map, file or template groups
pub fn print_groups(output: &Output, groups: &[Group]) {
    if output.is_json() {
        output.data(&groups);
        return;
    }

    if groups.is_empty() {
        println!("No groups found.");
        return;
    }

    println!("{:<34} NAME", "ID");
    println!("{}", "-".repeat(70));
    for group in groups {
        let suffix = if group.archived { " (archived)" } else { "" };
        println!("{:<34} {}{}", group.id, group.name, suffix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("Leak", 10), "Leak");
        assert_eq!(truncate("Leak in basement near stairs", 10), "Leak in...");
        assert_eq!(truncate("Überprüfung der Fassade", 8), "Überp...");
    }

    #[test]
    fn short_date_takes_day() {
        assert_eq!(short_date("2026-01-15T10:00:00.000Z"), "2026-01-15");
        assert_eq!(short_date(""), "-");
    }

    #[test]
    fn invalid_date_flag_names_the_flag() {
        let args = DateFilterArgs {
            modified_before: Some("yesterday".into()),
            ..DateFilterArgs::default()
        };
        let err = args.to_filters().unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.starts_with("--modified-before: invalid time expression"));
    }

    #[test]
    fn valid_date_flags_parse() {
        let args = DateFilterArgs {
            created_after: Some("2w".into()),
            created_before: Some("2026-01-15".into()),
            ..DateFilterArgs::default()
        };
        let filters = args.to_filters().unwrap();
        assert!(filters.created_after.is_some());
        assert!(filters.created_before.is_some());
        assert!(filters.modified_after.is_none());
    }

    #[test]
    fn footer_mentions_limit() {
        assert_eq!(total_line(3, 50, "tickets"), "Total: 3 tickets");
        assert!(total_line(50, 50, "tickets").starts_with("Showing 50 tickets (limit reached)"));
    }
}

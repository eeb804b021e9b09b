//! Audit CLI commands

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use super::common::{or_dash, short_date, total_line, truncate, DateFilterArgs, PagingArgs};
use super::output::Output;
use super::records::{list_scoped, print_detail, ListRequest, Listing, RecordView};
use super::session::{Connection, Session};
use crate::api::models::format_timestamp;
use crate::api::{ListQuery, NewAudit, ResourceSearchClient};
use crate::domain::{parse_api_timestamp, HumanId, RecordKind};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// List audits of one project, or of every active project
    List(AuditListArgs),

    /// Show audit details
    Get {
        /// Audit ID (human ID or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },

    /// Create an audit from a template
    ///
    /// Example:
    ///   ec audits create site-a 5f2c... -n "Weekly walk" -r jan@example.com
    Create(AuditCreateArgs),
}

#[derive(Args)]
pub struct AuditCreateArgs {
    /// Project ID
    pub project_id: String,

    /// Template ID
    pub template_id: String,

    /// Audit name (defaults to the template name)
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Responsible person email
    #[arg(long, short = 'r')]
    pub responsible: Option<String>,

    /// Due date (ISO 8601, e.g. 2026-12-31T23:59:59Z or 2026-12-31)
    #[arg(long, short = 'd')]
    pub due_date: Option<String>,

    /// Tag to add (repeatable)
    #[arg(long = "tag", short = 't')]
    pub tags: Vec<String>,
}

impl AuditCreateArgs {
    fn to_new_audit(&self) -> Result<NewAudit> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            bail!("audit name cannot be empty");
        }
        let due_date = match &self.due_date {
            Some(raw) => {
                let due = parse_api_timestamp(raw)
                    .with_context(|| format!("invalid --due-date '{}'", raw))?;
                Some(format_timestamp(due))
            }
            None => None,
        };
        Ok(NewAudit {
            name: self.name.clone(),
            responsible: self.responsible.clone(),
            due_date,
            tags: self.tags.clone(),
        })
    }
}

#[derive(Args)]
pub struct AuditListArgs {
    /// Project ID (omit to search all active projects)
    pub project_id: Option<String>,

    /// Filter by status (comma-separated)
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Filter by template ID
    #[arg(long, short = 't')]
    pub template: Option<String>,

    /// Search by title
    #[arg(long)]
    pub search: Option<String>,

    /// Filter by auditor email
    #[arg(long, short = 'a')]
    pub auditor: Option<String>,

    /// Filter by group ID
    #[arg(long, short = 'g')]
    pub group: Option<String>,

    /// Filter by tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Include archived audits
    #[arg(long)]
    pub archived: bool,

    /// Include inactive projects when searching all
    #[arg(long)]
    pub all_projects: bool,

    #[command(flatten)]
    pub paging: PagingArgs,

    #[command(flatten)]
    pub dates: DateFilterArgs,
}

impl AuditListArgs {
    fn to_request(&self) -> Result<ListRequest> {
        let filters = self.dates.to_filters()?;
        let mut query = ListQuery {
            search: self.search.clone(),
            status: self.status.clone(),
            responsible: self.auditor.clone(),
            group_id: self.group.clone(),
            tag: self.tag.clone(),
            template: self.template.clone(),
            archived: self.archived,
            ..ListQuery::default()
        };
        self.paging.apply(&mut query);

        let mut request = ListRequest::new(RecordKind::Audit, query, filters, self.paging.limit);
        request.all_projects = self.all_projects;
        Ok(request)
    }
}

pub fn run(cmd: AuditCommands, connection: &Connection, output: &Output) -> Result<()> {
    match cmd {
        AuditCommands::List(args) => {
            let request = args.to_request()?;
            let session = Session::open(connection, output)?;
            list_audits(&session, output, args.project_id.as_deref(), &request)
        }
        AuditCommands::Get { id, project } => {
            let session = Session::open(connection, output)?;
            let found = session.locate(output, RecordKind::Audit, &id, project.as_deref())?;
            let audit = session
                .api
                .get_record(RecordKind::Audit, &found.project_id, &found.remote_id)
                .with_context(|| format!("Failed to load audit {}", id))?;
            print_detail(output, RecordKind::Audit, &found.project_id, &audit);
            Ok(())
        }
        AuditCommands::Create(args) => {
            let audit = args.to_new_audit()?;
            let session = Session::open(connection, output)?;
            output.verbose_ctx(
                "audit",
                &format!("Creating audit from template {}", args.template_id),
            );
            let created = session
                .api
                .create_audit(&args.project_id, &args.template_id, &audit)
                .with_context(|| {
                    format!("Failed to create audit from template {}", args.template_id)
                })?;

            if output.is_json() {
                output.data(&RecordView::new(&created, Some(args.project_id.as_str())));
                return Ok(());
            }

            output.success(&format!("Audit {} created", HumanId::encode(&created.remote_id)));
            println!("ID: {}", created.remote_id);
            println!("Name: {}", or_dash(Some(created.display_name.as_str())));
            println!("Status: {}", or_dash(created.status.as_deref()));
            Ok(())
        }
    }
}

fn list_audits(
    session: &Session,
    output: &Output,
    project_id: Option<&str>,
    request: &ListRequest,
) -> Result<()> {
    let listing = list_scoped(session, output, project_id, request)?;

    if output.is_json() {
        output.data(&listing.views());
        return Ok(());
    }

    if listing.is_empty() {
        println!("No audits found.");
        return Ok(());
    }

    match &listing {
        Listing::Project(records) => {
            println!("{:<8} {:<40} {:<12} {:<25} CREATED", "HUMAN_ID", "NAME", "STATUS", "AUDITOR");
            println!("{}", "-".repeat(100));
            for audit in records {
                println!(
                    "{:<8} {:<40} {:<12} {:<25} {}",
                    audit.human_id(),
                    truncate(&audit.display_name, 40),
                    or_dash(audit.status.as_deref()),
                    truncate(or_dash(audit.responsible.as_deref()), 25),
                    short_date(&audit.created),
                );
            }
        }
        Listing::FanOut(records) => {
            println!("{:<8} {:<25} {:<40} {:<12} CREATED", "HUMAN_ID", "PROJECT", "NAME", "STATUS");
            println!("{}", "-".repeat(100));
            for entry in records {
                let audit = &entry.record;
                println!(
                    "{:<8} {:<25} {:<40} {:<12} {}",
                    audit.human_id(),
                    truncate(&entry.project_name, 25),
                    truncate(&audit.display_name, 40),
                    or_dash(audit.status.as_deref()),
                    short_date(&audit.created),
                );
            }
        }
    }

    println!();
    println!("{}", total_line(listing.len(), request.limit, "audits"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: AuditCreateArgs,
    }

    fn parse(args: &[&str]) -> AuditCreateArgs {
        let mut argv = vec!["create", "site-a", "tpl-1"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn template_defaults_leave_fields_unset() {
        let audit = parse(&[]).to_new_audit().unwrap();
        assert_eq!(audit.name, None);
        assert_eq!(audit.due_date, None);
        assert!(audit.tags.is_empty());
    }

    #[test]
    fn overrides_are_collected() {
        let audit = parse(&["-n", "Weekly walk", "-d", "2026-12-31", "-t", "a", "-t", "b"])
            .to_new_audit()
            .unwrap();
        assert_eq!(audit.name.as_deref(), Some("Weekly walk"));
        assert_eq!(audit.due_date.as_deref(), Some("2026-12-31T00:00:00.000Z"));
        assert_eq!(audit.tags, vec!["a", "b"]);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(parse(&["-n", "  "]).to_new_audit().is_err());
    }
}

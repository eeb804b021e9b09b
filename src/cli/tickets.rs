//! Ticket CLI commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use super::common::{or_dash, short_date, total_line, truncate, DateFilterArgs, PagingArgs};
use super::output::Output;
use super::records::{list_scoped, print_detail, ListRequest, Listing};
use super::session::{Connection, Session};
use crate::api::document::{escape_html, update_ticket, TicketState, TicketUpdate};
use crate::api::models::{format_timestamp, record_from_document, str_at};
use crate::api::{DocumentClient, ListQuery, ResourceSearchClient};
use crate::domain::{parse_api_timestamp, HumanId, RecordKind};

#[derive(Subcommand)]
pub enum TicketCommands {
    /// List tickets of one project, or of every active project
    ///
    /// Examples:
    ///   ec tickets list site-a -s started
    ///   ec tickets list --created-after 2w
    List(TicketListArgs),

    /// Show ticket details
    Get {
        /// Ticket ID (human ID like CC455B, or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },

    /// Reopen a ticket (status created)
    Open {
        /// Ticket ID (human ID or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },

    /// Close a ticket (status completed)
    Close {
        /// Ticket ID (human ID or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },

    /// Assign a ticket to someone (also starts it)
    Assign {
        /// Ticket ID (human ID or full ID)
        id: String,

        /// Email of the new responsible person
        #[arg(value_name = "EMAIL")]
        assignee: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },

    /// Update ticket fields, or show them when no change is given
    ///
    /// Examples:
    ///   ec tickets update CC455B -t "Leak in basement" --due-date 2026-03-15
    ///   ec tickets update CC455B --complete -m "Fixed on site"
    Update(TicketUpdateArgs),

    /// Archive a ticket
    Archive {
        /// Ticket ID (human ID or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },

    /// Restore an archived ticket
    Unarchive {
        /// Ticket ID (human ID or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },
}

#[derive(Args)]
pub struct TicketUpdateArgs {
    /// Ticket ID (human ID or full ID)
    pub id: String,

    /// Project ID (searched when omitted)
    #[arg(long, short = 'p')]
    pub project: Option<String>,

    /// New title
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// New description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Due date (ISO 8601, e.g. 2026-03-15T12:00:00.000Z or 2026-03-15)
    #[arg(long, conflicts_with = "clear_due")]
    pub due_date: Option<String>,

    /// Clear the due date
    #[arg(long)]
    pub clear_due: bool,

    /// Assign to this email (also starts the ticket)
    #[arg(long, short = 'r', conflicts_with = "clear_responsible")]
    pub responsible: Option<String>,

    /// Clear the responsible person (moves the ticket back to created)
    #[arg(long)]
    pub clear_responsible: bool,

    /// Mark the ticket completed (assigns you when nobody is responsible)
    #[arg(long)]
    pub complete: bool,

    /// Add a comment
    #[arg(long, short = 'm')]
    pub comment: Option<String>,
}

impl TicketUpdateArgs {
    /// Requested changes in application order
    fn to_updates(&self) -> Result<Vec<TicketUpdate>> {
        let mut updates = Vec::new();
        if let Some(title) = &self.title {
            updates.push(TicketUpdate::Retitle(title.clone()));
        }
        if let Some(description) = &self.description {
            updates.push(TicketUpdate::Describe(escape_html(description)));
        }
        if let Some(due) = &self.due_date {
            let due = parse_api_timestamp(due)
                .with_context(|| format!("invalid --due-date '{}'", due))?;
            updates.push(TicketUpdate::SetDue(format_timestamp(due)));
        }
        if self.clear_due {
            updates.push(TicketUpdate::ClearDue);
        }
        if let Some(responsible) = &self.responsible {
            updates.push(TicketUpdate::Assign(responsible.clone()));
        }
        if self.clear_responsible {
            updates.push(TicketUpdate::Unassign);
        }
        if self.complete {
            updates.push(TicketUpdate::Complete);
        }
        if let Some(comment) = &self.comment {
            updates.push(TicketUpdate::Comment(escape_html(comment)));
        }
        Ok(updates)
    }
}

#[derive(Args)]
pub struct TicketListArgs {
    /// Project ID (omit to search all active projects)
    pub project_id: Option<String>,

    /// Filter by status
    #[arg(long, short = 's', value_enum)]
    pub status: Option<TicketState>,

    /// Search by title
    #[arg(long)]
    pub search: Option<String>,

    /// Filter by responsible person email
    #[arg(long, short = 'r')]
    pub responsible: Option<String>,

    /// Filter by tag
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Filter by group ID
    #[arg(long, short = 'g')]
    pub group: Option<String>,

    /// Include archived tickets
    #[arg(long, short = 'a')]
    pub archived: bool,

    /// Include inactive projects when searching all
    #[arg(long)]
    pub all_projects: bool,

    #[command(flatten)]
    pub paging: PagingArgs,

    #[command(flatten)]
    pub dates: DateFilterArgs,
}

impl TicketListArgs {
    fn to_request(&self) -> Result<ListRequest> {
        let filters = self.dates.to_filters()?;
        let mut query = ListQuery {
            search: self.search.clone(),
            status: self.status.map(|s| s.as_str().to_string()),
            responsible: self.responsible.clone(),
            group_id: self.group.clone(),
            tag: self.tag.clone(),
            archived: self.archived,
            ..ListQuery::default()
        };
        self.paging.apply(&mut query);

        let mut request = ListRequest::new(RecordKind::Ticket, query, filters, self.paging.limit);
        request.all_projects = self.all_projects;
        Ok(request)
    }
}

pub fn run(cmd: TicketCommands, connection: &Connection, output: &Output) -> Result<()> {
    match cmd {
        TicketCommands::List(args) => {
            // bad date flags fail before any configuration is needed
            let request = args.to_request()?;
            let session = Session::open(connection, output)?;
            list_tickets(&session, output, args.project_id.as_deref(), &request)
        }
        TicketCommands::Get { id, project } => {
            let session = Session::open(connection, output)?;
            show_ticket(&session, output, &id, project.as_deref())
        }
        TicketCommands::Open { id, project } => {
            let session = Session::open(connection, output)?;
            let updates = [TicketUpdate::SetState(TicketState::Created)];
            change_ticket(&session, output, &id, project.as_deref(), &updates, |human_id| {
                format!("Ticket {} reopened (status: created)", human_id)
            })
        }
        TicketCommands::Close { id, project } => {
            let session = Session::open(connection, output)?;
            let updates = [TicketUpdate::SetState(TicketState::Completed)];
            change_ticket(&session, output, &id, project.as_deref(), &updates, |human_id| {
                format!("Ticket {} closed (status: completed)", human_id)
            })
        }
        TicketCommands::Assign { id, assignee, project } => {
            let session = Session::open(connection, output)?;
            let updates = [TicketUpdate::Assign(assignee.clone())];
            change_ticket(&session, output, &id, project.as_deref(), &updates, |human_id| {
                format!("Ticket {} assigned to {}", human_id, assignee)
            })
        }
        TicketCommands::Update(args) => {
            let updates = args.to_updates()?;
            let session = Session::open(connection, output)?;
            if updates.is_empty() {
                return show_fields(&session, output, &args.id, args.project.as_deref());
            }
            let summary = updates.iter().map(describe_update).collect::<Vec<_>>().join(", ");
            let project = args.project.as_deref();
            change_ticket(&session, output, &args.id, project, &updates, |human_id| {
                format!("Ticket {} updated: {}", human_id, summary)
            })
        }
        TicketCommands::Archive { id, project } => {
            let session = Session::open(connection, output)?;
            let updates = [TicketUpdate::Archive(true)];
            change_ticket(&session, output, &id, project.as_deref(), &updates, |human_id| {
                format!("Ticket {} archived", human_id)
            })
        }
        TicketCommands::Unarchive { id, project } => {
            let session = Session::open(connection, output)?;
            let updates = [TicketUpdate::Archive(false)];
            change_ticket(&session, output, &id, project.as_deref(), &updates, |human_id| {
                format!("Ticket {} unarchived", human_id)
            })
        }
    }
}

fn list_tickets(
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
        println!("No tickets found.");
        return Ok(());
    }

    match &listing {
        Listing::Project(records) => {
            println!(
                "{:<8} {:<40} {:<10} {:<25} {:<10} DUE",
                "HUMAN_ID", "TITLE", "STATUS", "ASSIGNED", "CREATED"
            );
            println!("{}", "-".repeat(110));
            for ticket in records {
                println!(
                    "{:<8} {:<40} {:<10} {:<25} {:<10} {}",
                    ticket.human_id(),
                    truncate(&ticket.display_name, 40),
                    or_dash(ticket.status.as_deref()),
                    truncate(or_dash(ticket.responsible.as_deref()), 25),
                    short_date(&ticket.created),
                    short_date(ticket.due.as_deref().unwrap_or_default()),
                );
            }
        }
        Listing::FanOut(records) => {
            println!(
                "{:<8} {:<25} {:<40} {:<10} {:<25} CREATED",
                "HUMAN_ID", "PROJECT", "TITLE", "STATUS", "ASSIGNED"
            );
            println!("{}", "-".repeat(125));
            for entry in records {
                let ticket = &entry.record;
                println!(
                    "{:<8} {:<25} {:<40} {:<10} {:<25} {}",
                    ticket.human_id(),
                    truncate(&entry.project_name, 25),
                    truncate(&ticket.display_name, 40),
                    or_dash(ticket.status.as_deref()),
                    truncate(or_dash(ticket.responsible.as_deref()), 25),
                    short_date(&ticket.created),
                );
            }
        }
    }

    println!();
    println!("{}", total_line(listing.len(), request.limit, "tickets"));
    Ok(())
}

fn show_ticket(session: &Session, output: &Output, id: &str, project: Option<&str>) -> Result<()> {
    let found = session.locate(output, RecordKind::Ticket, id, project)?;
    let ticket = session
        .api
        .get_record(RecordKind::Ticket, &found.project_id, &found.remote_id)
        .with_context(|| format!("Failed to load ticket {}", id))?;

    print_detail(output, RecordKind::Ticket, &found.project_id, &ticket);
    Ok(())
}

fn change_ticket(
    session: &Session,
    output: &Output,
    id: &str,
    project: Option<&str>,
    updates: &[TicketUpdate],
    done: impl FnOnce(&HumanId) -> String,
) -> Result<()> {
    let found = session.locate(output, RecordKind::Ticket, id, project)?;
    let actor = session.api.email()?;
    output.verbose_ctx("ticket", &format!("Applying {:?} as {}", updates, actor));

    let changed = update_ticket(&session.api, &found.project_id, &found.remote_id, updates, &actor)
        .with_context(|| format!("Failed to update ticket {}", id))?;

    let human_id = HumanId::encode(&found.remote_id);
    if changed {
        output.success(&done(&human_id));
    } else {
        output.success(&format!("Ticket {} unchanged", human_id));
    }
    Ok(())
}

/// One-line description of a change for the confirmation message
fn describe_update(update: &TicketUpdate) -> String {
    match update {
        TicketUpdate::SetState(state) => format!("status->{}", state.as_str()),
        TicketUpdate::Assign(email) => format!("responsible={} (status->started)", email),
        TicketUpdate::Unassign => "responsible cleared (status->created)".to_string(),
        TicketUpdate::Complete => "status->completed".to_string(),
        TicketUpdate::Retitle(title) => format!("title={:?}", title),
        TicketUpdate::Describe(body) => format!("description={:?}", truncate(body, 50)),
        TicketUpdate::SetDue(due) => format!("due-date={}", due),
        TicketUpdate::ClearDue => "due-date cleared".to_string(),
        TicketUpdate::Comment(text) => format!("comment added: {:?}", truncate(text, 50)),
        TicketUpdate::Archive(true) => "archived".to_string(),
        TicketUpdate::Archive(false) => "unarchived".to_string(),
    }
}

/// Editable ticket fields as shown by `tickets update` without changes
#[derive(Serialize)]
struct TicketFields {
    title: String,
    description: Option<String>,
    due: Option<String>,
    responsible: Option<String>,
    status: Option<String>,
}

fn show_fields(session: &Session, output: &Output, id: &str, project: Option<&str>) -> Result<()> {
    let found = session.locate(output, RecordKind::Ticket, id, project)?;
    let doc = session
        .api
        .get_document(&found.project_id, &found.remote_id)
        .with_context(|| format!("Failed to load ticket {}", id))?;

    let record = record_from_document(RecordKind::Ticket, &doc);
    let fields = TicketFields {
        title: record.display_name,
        description: str_at(&doc, &["content", "body"]).map(str::to_string),
        due: record.due,
        responsible: record.responsible,
        status: record.status,
    };

    if output.is_json() {
        output.data(&fields);
        return Ok(());
    }

    println!("Title: {}", or_dash(Some(fields.title.as_str())));
    println!("Description: {}", or_dash(fields.description.as_deref()));
    println!("Due date: {}", or_dash(fields.due.as_deref()));
    println!("Responsible: {}", or_dash(fields.responsible.as_deref()));
    println!("Status: {}", or_dash(fields.status.as_deref()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: TicketUpdateArgs,
    }

    fn parse(args: &[&str]) -> TicketUpdateArgs {
        let mut argv = vec!["update"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn no_flags_means_no_updates() {
        assert!(parse(&["CC455B"]).to_updates().unwrap().is_empty());
    }

    #[test]
    fn updates_follow_a_fixed_order() {
        let args = parse(&["CC455B", "-m", "done", "--complete", "-t", "Leak", "--clear-due"]);
        assert_eq!(
            args.to_updates().unwrap(),
            vec![
                TicketUpdate::Retitle("Leak".into()),
                TicketUpdate::ClearDue,
                TicketUpdate::Complete,
                TicketUpdate::Comment("done".into()),
            ]
        );
    }

    #[test]
    fn due_date_is_normalized() {
        let args = parse(&["CC455B", "--due-date", "2026-03-15"]);
        assert_eq!(
            args.to_updates().unwrap(),
            vec![TicketUpdate::SetDue("2026-03-15T00:00:00.000Z".into())]
        );
    }

    #[test]
    fn bad_due_date_is_rejected() {
        let err = parse(&["CC455B", "--due-date", "next week"]).to_updates().unwrap_err();
        assert!(err.to_string().contains("--due-date"));
    }

    #[test]
    fn rich_text_is_escaped() {
        let args = parse(&["CC455B", "-d", "<script>x</script>"]);
        assert_eq!(
            args.to_updates().unwrap(),
            vec![TicketUpdate::Describe("&lt;script&gt;x&lt;/script&gt;".into())]
        );
    }

    #[test]
    fn clearing_conflicts_with_setting() {
        let argv = ["update", "CC455B", "--due-date", "2026-03-15", "--clear-due"];
        assert!(Harness::try_parse_from(argv).is_err());
    }

    #[test]
    fn summary_lists_each_change() {
        assert_eq!(describe_update(&TicketUpdate::ClearDue), "due-date cleared");
        assert_eq!(describe_update(&TicketUpdate::Retitle("Leak".into())), "title=\"Leak\"");
    }
}

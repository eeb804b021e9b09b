//! Map CLI commands

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use super::common::{
    or_dash, print_groups, short_date, total_line, truncate, DateFilterArgs, PagingArgs,
};
use super::output::Output;
use super::records::{list_project, print_detail, ListRequest, RecordView};
use super::session::{Connection, Session};
use super::upload::{report_failure, UploadArgs};
use crate::api::{ListQuery, ResourceSearchClient, UploadClient};
use crate::domain::{format_size, is_map_source, RecordKind};
use crate::service::UploadPipeline;

#[derive(Subcommand)]
pub enum MapCommands {
    /// List maps of a project
    List(MapListArgs),

    /// Show map details
    Get {
        /// Map ID (human ID or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },

    /// Upload a PDF, PNG or JPG and convert it to a map
    ///
    /// The conversion runs in the background; the map shows up once the
    /// backend has finished it.
    Add(UploadArgs),

    /// Delete a map
    Delete {
        /// Project ID
        project_id: String,

        /// Map ID (human ID or full ID)
        map_id: String,
    },

    /// List map groups of a project
    Groups {
        /// Project ID
        project_id: String,
    },
}

#[derive(Args)]
pub struct MapListArgs {
    /// Project ID
    pub project_id: String,

    /// Search by name
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Filter by group ID
    #[arg(long, short = 'g')]
    pub group: Option<String>,

    /// Filter by tag
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Include maps of every group
    #[arg(long)]
    pub all: bool,

    /// Include archived maps
    #[arg(long, short = 'a')]
    pub archived: bool,

    #[command(flatten)]
    pub paging: PagingArgs,

    #[command(flatten)]
    pub dates: DateFilterArgs,
}

pub fn run(cmd: MapCommands, connection: &Connection, output: &Output) -> Result<()> {
    match cmd {
        MapCommands::List(args) => {
            let filters = args.dates.to_filters()?;
            let mut query = ListQuery {
                search: args.search.clone(),
                group_id: args.group.clone(),
                tag: args.tag.clone(),
                all: args.all,
                archived: args.archived,
                ..ListQuery::default()
            };
            args.paging.apply(&mut query);
            let request = ListRequest::new(RecordKind::Map, query, filters, args.paging.limit);

            let session = Session::open(connection, output)?;
            list_maps(&session, output, &args.project_id, &request)
        }
        MapCommands::Get { id, project } => {
            let session = Session::open(connection, output)?;
            let found = session.locate(output, RecordKind::Map, &id, project.as_deref())?;
            let map = session
                .api
                .get_record(RecordKind::Map, &found.project_id, &found.remote_id)
                .with_context(|| format!("Failed to load map {}", id))?;
            print_detail(output, RecordKind::Map, &found.project_id, &map);
            Ok(())
        }
        MapCommands::Add(args) => {
            if !is_map_source(&args.file) {
                bail!("invalid file type: only PDF, PNG, and JPG files can be converted to maps");
            }
            let session = Session::open(connection, output)?;
            add_map(&session, output, &args)
        }
        MapCommands::Delete { project_id, map_id } => {
            let session = Session::open(connection, output)?;
            let found = session.locate(output, RecordKind::Map, &map_id, Some(&project_id))?;
            session
                .api
                .delete_records(&found.project_id, RecordKind::Map, &[found.remote_id.clone()])
                .with_context(|| format!("Failed to delete map {}", map_id))?;
            output.success(&format!("Map {} deleted", map_id));
            Ok(())
        }
        MapCommands::Groups { project_id } => {
            let session = Session::open(connection, output)?;
            let groups = session.api.list_groups(RecordKind::Map, &project_id)?;
            print_groups(output, &groups);
            Ok(())
        }
    }
}

fn list_maps(
    session: &Session,
    output: &Output,
    project_id: &str,
    request: &ListRequest,
) -> Result<()> {
    let maps = list_project(session, output, project_id, request)?;

    if output.is_json() {
        let views: Vec<_> = maps.iter().map(|m| RecordView::new(m, None)).collect();
        output.data(&views);
        return Ok(());
    }

    if maps.is_empty() {
        println!("No maps found.");
        return Ok(());
    }

    println!(
        "{:<8} {:<40} {:<25} {:<10} {:<10} MODIFIED",
        "HUMAN_ID", "NAME", "GROUP", "STATUS", "CREATED"
    );
    println!("{}", "-".repeat(110));
    for map in &maps {
        let group = map.group_name.as_deref().or(map.group_id.as_deref());
        println!(
            "{:<8} {:<40} {:<25} {:<10} {:<10} {}",
            map.human_id(),
            truncate(&map.display_name, 40),
            truncate(or_dash(group), 25),
            map.lifecycle(),
            short_date(&map.created),
            short_date(&map.modified),
        );
    }

    println!();
    println!("{}", total_line(maps.len(), request.limit, "maps"));
    Ok(())
}

fn add_map(session: &Session, output: &Output, args: &UploadArgs) -> Result<()> {
    let request = args.to_request();
    let size = std::fs::metadata(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?
        .len();
    output.progress(&format!(
        "Uploading {} ({})...",
        request.resolved_display_name(),
        format_size(size)
    ));

    let pipeline = UploadPipeline::new(&session.api, session.pipeline_settings());
    let outcome = pipeline.run(&request).map_err(|e| report_failure(output, e))?;

    if output.is_json() {
        output.data(&outcome);
    } else {
        output.success(&format!(
            "File {} uploaded as '{}'. Map conversion queued.",
            outcome.human_id, outcome.display_name
        ));
        output.verbose_ctx("maps", &format!("File record {}", outcome.record_id));
    }
    Ok(())
}

//! File CLI commands

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::common::{
    or_dash, print_groups, short_date, total_line, truncate, DateFilterArgs, PagingArgs,
};
use super::output::Output;
use super::records::{list_project, print_detail, ListRequest, RecordView};
use super::session::{Connection, Session};
use super::upload::{report_failure, UploadArgs};
use crate::api::{ListQuery, ResourceSearchClient};
use crate::domain::{format_size, RecordKind};
use crate::service::UploadPipeline;

#[derive(Subcommand)]
pub enum FileCommands {
    /// List files of a project
    List(FileListArgs),

    /// Show file details
    Get {
        /// File ID (human ID or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,
    },

    /// Upload a file
    Add(UploadArgs),

    /// Download a file
    Download {
        /// File ID (human ID or full ID)
        id: String,

        /// Project ID (searched when omitted)
        #[arg(long, short = 'p')]
        project: Option<String>,

        /// Where to write the file (defaults to its name in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Archive a file
    Archive {
        /// Project ID
        project_id: String,

        /// File ID (human ID or full ID)
        file_id: String,
    },

    /// Restore an archived file
    Unarchive {
        /// Project ID
        project_id: String,

        /// File ID (human ID or full ID)
        file_id: String,
    },

    /// List file groups of a project
    Groups {
        /// Project ID
        project_id: String,
    },
}

#[derive(Args)]
pub struct FileListArgs {
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

    /// Include archived files
    #[arg(long, short = 'a')]
    pub archived: bool,

    #[command(flatten)]
    pub paging: PagingArgs,

    #[command(flatten)]
    pub dates: DateFilterArgs,
}

pub fn run(cmd: FileCommands, connection: &Connection, output: &Output) -> Result<()> {
    match cmd {
        FileCommands::List(args) => {
            let filters = args.dates.to_filters()?;
            let mut query = ListQuery {
                search: args.search.clone(),
                group_id: args.group.clone(),
                tag: args.tag.clone(),
                archived: args.archived,
                ..ListQuery::default()
            };
            args.paging.apply(&mut query);
            let request = ListRequest::new(RecordKind::File, query, filters, args.paging.limit);

            let session = Session::open(connection, output)?;
            list_files(&session, output, &args.project_id, &request)
        }
        FileCommands::Get { id, project } => {
            let session = Session::open(connection, output)?;
            let found = session.locate(output, RecordKind::File, &id, project.as_deref())?;
            let file = session
                .api
                .get_record(RecordKind::File, &found.project_id, &found.remote_id)
                .with_context(|| format!("Failed to load file {}", id))?;
            print_detail(output, RecordKind::File, &found.project_id, &file);
            Ok(())
        }
        FileCommands::Add(args) => {
            let session = Session::open(connection, output)?;
            add_file(&session, output, &args)
        }
        FileCommands::Download {
            id,
            project,
            output: target,
        } => {
            let session = Session::open(connection, output)?;
            download(&session, output, &id, project.as_deref(), target)
        }
        FileCommands::Archive { project_id, file_id } => {
            let session = Session::open(connection, output)?;
            set_archived(&session, output, &project_id, &file_id, true)
        }
        FileCommands::Unarchive { project_id, file_id } => {
            let session = Session::open(connection, output)?;
            set_archived(&session, output, &project_id, &file_id, false)
        }
        FileCommands::Groups { project_id } => {
            let session = Session::open(connection, output)?;
            let groups = session.api.list_groups(RecordKind::File, &project_id)?;
            print_groups(output, &groups);
            Ok(())
        }
    }
}

fn list_files(
    session: &Session,
    output: &Output,
    project_id: &str,
    request: &ListRequest,
) -> Result<()> {
    let files = list_project(session, output, project_id, request)?;

    if output.is_json() {
        let views: Vec<_> = files.iter().map(|f| RecordView::new(f, None)).collect();
        output.data(&views);
        return Ok(());
    }

    if files.is_empty() {
        println!("No files found.");
        return Ok(());
    }

    println!(
        "{:<8} {:<40} {:<20} {:>10} {:<10} {:<10} MODIFIED",
        "HUMAN_ID", "NAME", "GROUP", "SIZE", "STATUS", "CREATED"
    );
    println!("{}", "-".repeat(120));
    for file in &files {
        let group = file.group_name.as_deref().or(file.group_id.as_deref());
        let size = file.size.map(format_size).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<40} {:<20} {:>10} {:<10} {:<10} {}",
            file.human_id(),
            truncate(&file.display_name, 40),
            truncate(or_dash(group), 20),
            size,
            file.lifecycle(),
            short_date(&file.created),
            short_date(&file.modified),
        );
    }

    println!();
    println!("{}", total_line(files.len(), request.limit, "files"));
    Ok(())
}

fn add_file(session: &Session, output: &Output, args: &UploadArgs) -> Result<()> {
    let request = args.to_request();
    let size = fs::metadata(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?
        .len();
    output.progress(&format!(
        "Uploading {} ({})...",
        request.resolved_display_name(),
        format_size(size)
    ));

    let pipeline = UploadPipeline::new(&session.api, session.pipeline_settings());
    let stored = pipeline.store(&request).map_err(|e| report_failure(output, e))?;

    if output.is_json() {
        output.data(&stored);
    } else {
        output.success(&format!(
            "Uploaded '{}' ({})",
            stored.display_name,
            format_size(stored.size)
        ));
        output.verbose_ctx("files", &format!("Stored as {}", stored.uploaded_name));
    }
    Ok(())
}

fn download(
    session: &Session,
    output: &Output,
    id: &str,
    project: Option<&str>,
    target: Option<PathBuf>,
) -> Result<()> {
    let found = session.locate(output, RecordKind::File, id, project)?;
    let file = session
        .api
        .get_record(RecordKind::File, &found.project_id, &found.remote_id)
        .with_context(|| format!("Failed to load file {}", id))?;

    let target = target.unwrap_or_else(|| PathBuf::from(&file.display_name));
    output.progress(&format!("Downloading {}...", file.display_name));

    let bytes = session
        .api
        .download_file(&found.project_id, &file)
        .with_context(|| format!("Failed to download file {}", id))?;
    fs::write(&target, &bytes).with_context(|| format!("Failed to write {}", target.display()))?;

    output.success(&format!(
        "Saved {} ({}) to {}",
        file.display_name,
        format_size(bytes.len() as u64),
        target.display()
    ));
    Ok(())
}

fn set_archived(
    session: &Session,
    output: &Output,
    project_id: &str,
    file_id: &str,
    archive: bool,
) -> Result<()> {
    let found = session.locate(output, RecordKind::File, file_id, Some(project_id))?;
    session
        .api
        .archive_files(&found.project_id, &[found.remote_id.clone()], archive)
        .with_context(|| format!("Failed to update file {}", file_id))?;

    let verb = if archive { "archived" } else { "restored" };
    output.success(&format!("File {} {}", file_id, verb));
    Ok(())
}

//! Project CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::common::truncate;
use super::output::Output;
use super::session::{Connection, Session};
use crate::api::ResourceSearchClient;
use crate::domain::ProjectHandle;

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List projects
    List {
        /// Search by project name or ID
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Include the glacier (long-term storage) bucket
        #[arg(long, short = 'g')]
        glacier: bool,
    },

    /// Show project details
    Get {
        /// Project ID
        project_id: String,
    },
}

pub fn run(cmd: ProjectCommands, connection: &Connection, output: &Output) -> Result<()> {
    let session = Session::open(connection, output)?;
    match cmd {
        ProjectCommands::List { search, glacier } => {
            list_projects(&session, output, search.as_deref(), glacier)
        }
        ProjectCommands::Get { project_id } => show_project(&session, output, &project_id),
    }
}

fn matches_search(project: &ProjectHandle, search: Option<&str>) -> bool {
    let Some(search) = search else {
        return true;
    };
    let needle = search.to_lowercase();
    project.name.to_lowercase().contains(&needle) || project.id.to_lowercase().contains(&needle)
}

fn list_projects(
    session: &Session,
    output: &Output,
    search: Option<&str>,
    glacier: bool,
) -> Result<()> {
    let mut projects: Vec<ProjectHandle> = session
        .api
        .list_projects()?
        .into_iter()
        .filter(|p| matches_search(p, search))
        .collect();
    projects.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    let hidden = projects.iter().filter(|p| p.is_archival_only).count();
    if !glacier {
        projects.retain(|p| !p.is_archival_only);
    }
    output.verbose_ctx("projects", &format!("{} projects, {} archival", projects.len(), hidden));

    if output.is_json() {
        output.data(&projects);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    println!("{:<40} {:<50} STATUS", "PROJECT_ID", "NAME");
    println!("{}", "-".repeat(100));
    for project in &projects {
        let id = if project.is_archival_only { "<glacier>" } else { project.id.as_str() };
        println!("{:<40} {:<50} {}", id, truncate(&project.name, 50), project.status());
    }

    println!();
    if hidden > 0 && !glacier {
        println!(
            "Total: {} projects ({} glacier projects hidden, use -g to show)",
            projects.len(),
            hidden
        );
    } else {
        println!("Total: {} projects", projects.len());
    }

    Ok(())
}

fn show_project(session: &Session, output: &Output, project_id: &str) -> Result<()> {
    let project = session.api.project(project_id)?;

    if output.is_json() {
        output.data(&project);
        return Ok(());
    }

    println!("Project: {}", project.name);
    println!("Project ID: {}", project.id);
    println!("Document ID: {}", project.document_id);
    if let Some(location) = &project.location {
        println!("Location: {}", location);
    }
    println!("Status: {}", project.status());
    if let Some(archived) = &project.archived {
        println!("Archived: {}", archived);
    }
    if let Some(start) = &project.start_date {
        println!("Start Date: {}", start);
    }
    if let Some(end) = &project.end_date {
        println!("End Date: {}", end);
    }
    if let Some(contract) = &project.contract {
        println!("Contract: {}", contract);
    }

    Ok(())
}

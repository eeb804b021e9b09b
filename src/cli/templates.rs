//! Audit template CLI commands

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::{json, Map, Value};

use super::common::{or_dash, print_groups, short_date, total_line, truncate, PagingArgs};
use super::output::Output;
use super::records::{list_project, print_detail, ListRequest, RecordView};
use super::session::{Connection, Session};
use crate::api::document::update_fields;
use crate::api::{ListQuery, ResourceSearchClient};
use crate::domain::{DateFilterSet, RecordKind};

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List audit templates of a project
    List {
        /// Project ID
        project_id: String,

        /// Search by name
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Only published (true) or unpublished (false) templates
        #[arg(long)]
        published: Option<bool>,

        /// Include archived templates
        #[arg(long, short = 'a')]
        archived: bool,

        #[command(flatten)]
        paging: PagingArgs,
    },

    /// Show template details
    Get {
        /// Project ID
        project_id: String,

        /// Template ID
        template_id: String,
    },

    /// Update a template's name, description or tags
    Update(TemplateUpdateArgs),

    /// Publish a template so audits can be created from it
    Publish {
        /// Project ID
        project_id: String,

        /// Template ID
        template_id: String,
    },

    /// Withdraw a published template
    Unpublish {
        /// Project ID
        project_id: String,

        /// Template ID
        template_id: String,
    },

    /// List template groups of a project
    Groups {
        /// Project ID
        project_id: String,
    },
}

#[derive(Args)]
pub struct TemplateUpdateArgs {
    /// Project ID
    pub project_id: String,

    /// Template ID
    pub template_id: String,

    /// New name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// New description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Tag to set, replacing existing tags (repeatable)
    #[arg(long = "tag", short = 't')]
    pub tags: Vec<String>,
}

impl TemplateUpdateArgs {
    /// Document fields to overwrite
    fn to_fields(&self) -> Result<Map<String, Value>> {
        let mut fields = Map::new();
        if let Some(name) = &self.name {
            fields.insert("name".to_string(), json!(name));
        }
        if let Some(description) = &self.description {
            fields.insert("description".to_string(), json!(description));
        }
        if !self.tags.is_empty() {
            fields.insert("tags".to_string(), json!(self.tags));
        }
        if fields.is_empty() {
            bail!("no updates specified (use --name, --description or --tag)");
        }
        Ok(fields)
    }
}

fn published_field(published: bool) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("isPublished".to_string(), json!(published));
    fields
}

pub fn run(cmd: TemplateCommands, connection: &Connection, output: &Output) -> Result<()> {
    match cmd {
        TemplateCommands::List {
            project_id,
            search,
            published,
            archived,
            paging,
        } => {
            let session = Session::open(connection, output)?;
            let mut query = ListQuery {
                search,
                published,
                archived,
                ..ListQuery::default()
            };
            paging.apply(&mut query);
            let request = ListRequest::new(
                RecordKind::Template,
                query,
                DateFilterSet::default(),
                paging.limit,
            );
            list_templates(&session, output, &project_id, &request)
        }
        TemplateCommands::Get {
            project_id,
            template_id,
        } => {
            let session = Session::open(connection, output)?;
            let template =
                session.api.get_record(RecordKind::Template, &project_id, &template_id)?;
            print_detail(output, RecordKind::Template, &project_id, &template);
            Ok(())
        }
        TemplateCommands::Update(args) => {
            let fields = args.to_fields()?;
            let session = Session::open(connection, output)?;
            change_template(
                &session,
                output,
                &args.project_id,
                &args.template_id,
                &fields,
                "updated",
            )
        }
        TemplateCommands::Publish {
            project_id,
            template_id,
        } => {
            let session = Session::open(connection, output)?;
            change_template(
                &session,
                output,
                &project_id,
                &template_id,
                &published_field(true),
                "published",
            )
        }
        TemplateCommands::Unpublish {
            project_id,
            template_id,
        } => {
            let session = Session::open(connection, output)?;
            change_template(
                &session,
                output,
                &project_id,
                &template_id,
                &published_field(false),
                "unpublished",
            )
        }
        TemplateCommands::Groups { project_id } => {
            let session = Session::open(connection, output)?;
            let groups = session.api.list_groups(RecordKind::Template, &project_id)?;
            print_groups(output, &groups);
            Ok(())
        }
    }
}

fn change_template(
    session: &Session,
    output: &Output,
    project_id: &str,
    template_id: &str,
    fields: &Map<String, Value>,
    done: &str,
) -> Result<()> {
    let keys: Vec<&String> = fields.keys().collect();
    output.verbose_ctx("template", &format!("Setting {:?} on {}", keys, template_id));
    let changed = update_fields(&session.api, project_id, template_id, fields)
        .with_context(|| format!("Failed to update template {}", template_id))?;

    if changed {
        output.success(&format!("Template {} {}", template_id, done));
    } else {
        output.success(&format!("Template {} unchanged", template_id));
    }
    Ok(())
}

fn list_templates(
    session: &Session,
    output: &Output,
    project_id: &str,
    request: &ListRequest,
) -> Result<()> {
    let templates = list_project(session, output, project_id, request)?;

    if output.is_json() {
        let views: Vec<_> = templates.iter().map(|t| RecordView::new(t, None)).collect();
        output.data(&views);
        return Ok(());
    }

    if templates.is_empty() {
        println!("No templates found.");
        return Ok(());
    }

    println!("{:<34} {:<40} {:<10} MODIFIED", "ID", "NAME", "STATUS");
    println!("{}", "-".repeat(100));
    for template in &templates {
        println!(
            "{:<34} {:<40} {:<10} {}",
            template.remote_id,
            truncate(&template.display_name, 40),
            or_dash(template.status.as_deref()),
            short_date(&template.modified),
        );
    }

    println!();
    println!("{}", total_line(templates.len(), request.limit, "templates"));
    Ok(())
}

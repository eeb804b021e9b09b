//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::session::Connection;
use super::{account, audits, contracts, files, maps, projects, templates, tickets};
use crate::config::{Overrides, BASE_URL_ENV, EMAIL_ENV, TOKEN_ENV};

#[derive(Parser)]
#[command(name = "ec")]
#[command(author, version, about = "Command-line client for the EdControls construction platform")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to a config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API access token
    #[arg(long, global = true, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,

    /// Email of the authenticated user
    #[arg(long, global = true, env = EMAIL_ENV)]
    pub email: Option<String>,

    /// API base URL
    #[arg(long, global = true, env = BASE_URL_ENV, hide = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the authenticated user
    Whoami,

    /// Show how to configure the CLI
    Configure {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },

    /// Browse projects
    #[command(subcommand)]
    Projects(projects::ProjectCommands),

    /// Browse contracts (clients)
    #[command(subcommand)]
    Contracts(contracts::ContractCommands),

    /// Manage tickets
    #[command(subcommand)]
    Tickets(tickets::TicketCommands),

    /// Browse and create audits
    #[command(subcommand)]
    Audits(audits::AuditCommands),

    /// Manage audit templates
    #[command(subcommand)]
    Templates(templates::TemplateCommands),

    /// Manage maps
    #[command(subcommand)]
    Maps(maps::MapCommands),

    /// Manage files
    #[command(subcommand)]
    Files(files::FileCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("EdControls CLI starting");

    let connection = Connection {
        config: cli.config,
        overrides: Overrides {
            token: cli.token,
            email: cli.email,
            base_url: cli.base_url,
        },
    };

    match cli.command {
        Commands::Whoami => account::whoami(&connection, &output)?,
        Commands::Configure { show } => account::configure(&connection, &output, show)?,
        Commands::Projects(cmd) => projects::run(cmd, &connection, &output)?,
        Commands::Contracts(cmd) => contracts::run(cmd, &connection, &output)?,
        Commands::Tickets(cmd) => tickets::run(cmd, &connection, &output)?,
        Commands::Audits(cmd) => audits::run(cmd, &connection, &output)?,
        Commands::Templates(cmd) => templates::run(cmd, &connection, &output)?,
        Commands::Maps(cmd) => maps::run(cmd, &connection, &output)?,
        Commands::Files(cmd) => files::run(cmd, &connection, &output)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}

/// Installs the stderr log subscriber; `RUST_LOG` takes precedence
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "edcontrols_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

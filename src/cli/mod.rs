//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Account | Identity and setup | `whoami`, `configure --show` |
//! | Projects | Project browsing | `projects list -g`, `projects get` |
//! | Contracts | Billing clients | `contracts list`, `contracts projects <id>` |
//! | Tickets | Ticket lifecycle | `tickets close CC455B`, `tickets update CC455B --complete` |
//! | Audits | Audits from templates | `audits list --created-after 2w`, `audits create` |
//! | Templates | Audit templates | `templates publish <project-id> <id>`, `templates groups` |
//! | Maps | Map upload and conversion | `maps add`, `maps delete` |
//! | Files | File library | `files add`, `files download` |
//!
//! ## Identifiers
//!
//! Tickets, audits, maps and files accept either the six character human ID
//! shown in listings or the full backend ID. Without `-p <project>` the
//! record is searched for across all active projects.
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! ec --verbose tickets get CC455B
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod common;
mod session;
mod records;
mod upload;
mod account;
mod projects;
mod contracts;
mod tickets;
mod audits;
mod templates;
mod maps;
mod files;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};

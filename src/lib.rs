//! EdControls CLI - command-line client for the EdControls construction
//! platform
//!
//! Records (tickets, audits, maps, files) are addressed by short human IDs
//! derived from their backend identifiers. The [`service`] layer resolves
//! those IDs across projects, filters listings by relative dates and runs
//! the multi-stage upload that turns local files into maps.

pub mod domain;
pub mod api;
pub mod service;
pub mod config;
pub mod cli;

pub use domain::{DateFilterSet, HumanId, ProjectHandle, RecordKind, ResourceRecord};

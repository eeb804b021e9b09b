//! Contract CLI commands
//!
//! Contracts are the billing clients projects belong to. There is no
//! contract listing endpoint, so contracts are collected from the
//! user's projects and looked up one by one.

use std::collections::BTreeMap;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::common::{or_dash, truncate};
use super::output::Output;
use super::session::{Connection, Session};
use crate::api::{ApiError, Contract, ResourceSearchClient};
use crate::domain::ProjectHandle;

#[derive(Subcommand)]
pub enum ContractCommands {
    /// List the contracts of your projects
    List,

    /// List the projects of one contract
    Projects {
        /// Contract ID
        contract_id: String,
    },
}

/// Contract as listed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSummary {
    pub id: String,
    pub name: String,
    pub project_count: usize,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_plan: Option<String>,
}

pub fn run(cmd: ContractCommands, connection: &Connection, output: &Output) -> Result<()> {
    let session = Session::open(connection, output)?;
    match cmd {
        ContractCommands::List => list_contracts(&session, output),
        ContractCommands::Projects { contract_id } => {
            list_contract_projects(&session, output, &contract_id)
        }
    }
}

/// Number of projects per contract ID
fn projects_per_contract(projects: &[ProjectHandle]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for contract in projects.iter().filter_map(|p| p.contract.as_deref()) {
        *counts.entry(contract).or_insert(0) += 1;
    }
    counts
}

/// Looks up every contract referenced by `projects`, sorted by name.
///
/// A contract that cannot be fetched is still listed, named `(unknown)`.
fn summarize<F>(projects: &[ProjectHandle], mut fetch: F) -> Vec<ContractSummary>
where
    F: FnMut(&str) -> Result<Contract, ApiError>,
{
    let mut summaries: Vec<ContractSummary> = projects_per_contract(projects)
        .into_iter()
        .map(|(id, project_count)| match fetch(id) {
            Ok(contract) => ContractSummary {
                id: id.to_string(),
                name: contract.name,
                project_count,
                active: contract.active,
                price_plan: Some(contract.price_plan).filter(|p| !p.is_empty()),
            },
            Err(e) => {
                tracing::debug!(contract = id, error = %e, "contract lookup failed");
                ContractSummary {
                    id: id.to_string(),
                    name: "(unknown)".to_string(),
                    project_count,
                    active: false,
                    price_plan: None,
                }
            }
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    summaries
}

fn list_contracts(session: &Session, output: &Output) -> Result<()> {
    let projects = session.api.list_projects()?;
    let contracts = summarize(&projects, |id| session.api.contract(id));
    output.verbose_ctx(
        "contracts",
        &format!("{} contracts across {} projects", contracts.len(), projects.len()),
    );

    if output.is_json() {
        output.data(&contracts);
        return Ok(());
    }

    if contracts.is_empty() {
        println!("No contracts found.");
        return Ok(());
    }

    println!("{:<34} {:<35} {:<8} {:<6} PLAN", "ID", "NAME", "PROJECTS", "ACTIVE");
    println!("{}", "-".repeat(95));
    for contract in &contracts {
        println!(
            "{:<34} {:<35} {:<8} {:<6} {}",
            contract.id,
            truncate(&contract.name, 35),
            contract.project_count,
            if contract.active { "Yes" } else { "No" },
            or_dash(contract.price_plan.as_deref()),
        );
    }

    println!();
    println!("Total: {} contracts", contracts.len());
    Ok(())
}

fn list_contract_projects(session: &Session, output: &Output, contract_id: &str) -> Result<()> {
    let projects: Vec<ProjectHandle> = session
        .api
        .list_projects()?
        .into_iter()
        .filter(|p| p.contract.as_deref() == Some(contract_id))
        .collect();

    if output.is_json() {
        output.data(&projects);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects found for contract {}", contract_id);
        return Ok(());
    }

    let name = match session.api.contract(contract_id) {
        Ok(contract) if !contract.name.is_empty() => contract.name,
        _ => contract_id.to_string(),
    };
    println!("Projects for contract: {}", name);
    println!();

    println!("{:<40} {:<50} STATUS", "PROJECT_ID", "NAME");
    println!("{}", "-".repeat(100));
    for project in &projects {
        println!("{:<40} {:<50} {}", project.id, truncate(&project.name, 50), project.status());
    }

    println!();
    println!("Total: {} projects", projects.len());
    Ok(())
}

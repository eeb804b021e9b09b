//! `whoami` and `configure`

use anyhow::Result;

use super::output::Output;
use super::session::{Connection, Session};
use crate::config::{config_help, Config};

pub fn whoami(connection: &Connection, output: &Output) -> Result<()> {
    let session = Session::open(connection, output)?;
    let user = session.api.current_user()?;

    if output.is_json() {
        output.data(&user);
        return Ok(());
    }

    println!("Email: {}", user.email);
    let name = user.full_name();
    if !name.is_empty() {
        println!("Name: {}", name);
    }
    if !user.company_name.is_empty() {
        println!("Company: {}", user.company_name);
    }
    if !user.roles.is_empty() {
        println!("Roles: {}", user.roles.join(", "));
    }

    Ok(())
}

/// Prints configuration help, or the effective configuration with `--show`
pub fn configure(connection: &Connection, output: &Output, show: bool) -> Result<()> {
    let path = connection.config.clone().or_else(Config::default_path);

    if !show {
        if output.is_json() {
            output.data(&serde_json::json!({
                "config_path": path.map(|p| p.display().to_string()),
                "help": config_help(),
            }));
        } else {
            println!("EdControls CLI Configuration");
            println!("============================");
            println!();
            println!("{}", config_help());
        }
        return Ok(());
    }

    let config = connection.load_config()?;
    let mut shown = config.clone();
    shown.token = config.masked_token();

    if output.is_json() {
        output.data(&serde_json::json!({
            "config_path": path.map(|p| p.display().to_string()),
            "config": shown,
        }));
        return Ok(());
    }

    if let Some(path) = path {
        let state = if path.exists() { "" } else { " (not found, using defaults)" };
        println!("Config file: {}{}", path.display(), state);
    }
    println!("Base URL: {}", shown.base_url);
    println!("Token: {}", shown.token.as_deref().unwrap_or("(not set)"));
    println!("Email: {}", shown.email.as_deref().unwrap_or("(looked up from token)"));
    println!("Timeout: {}s", shown.timeout_secs);
    println!();
    println!("Upload:");
    println!("  discover_page_size: {}", shown.upload.discover_page_size);
    println!("  poll_initial_delay_ms: {}", shown.upload.poll_initial_delay_ms);
    println!("  poll_max_delay_ms: {}", shown.upload.poll_max_delay_ms);
    println!("  poll_timeout_ms: {}", shown.upload.poll_timeout_ms);
    println!("  cleanup_on_failure: {}", shown.upload.cleanup_on_failure);

    Ok(())
}

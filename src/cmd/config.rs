//! Configuration view and validation commands: `builderhub config`.

use std::path::Path;

use anyhow::Result;
use builderhub::config::HubConfig;
use console::style;

use super::super::ConfigCommands;

/// Resolve the effective configuration: file, then environment, then the
/// `--api-url` flag.
pub fn load_config(path: &Path, api_url: Option<&str>) -> Result<HubConfig> {
    let mut config = HubConfig::load_or_default(path)?;
    config.apply_env()?;
    if let Some(url) = api_url {
        config.api.base_url = url.to_string();
    }
    Ok(config)
}

pub fn cmd_config(path: &Path, config: &HubConfig, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("BuilderHub Configuration");
            println!("========================");
            println!();
            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No config file at {} (using defaults)", path.display());
            }
            println!();
            println!("[api]");
            println!("  base_url = \"{}\"", config.api_base_url());
            println!("  timeout_secs = {}", config.api.timeout_secs);
            println!();
            println!("[realtime]");
            println!("  mode = \"{:?}\"", config.realtime.mode);
            println!("  poll_interval_ms = {}", config.realtime.poll_interval_ms);
            println!("  reconcile = \"{}\"", config.realtime.reconcile.as_str());
            println!();
            println!("[session]");
            println!("  token_file = \"{}\"", config.token_file().display());
            println!();
            println!("[logging]");
            println!("  format = \"{:?}\"", config.logging.format);
            if let Some(dir) = &config.logging.directory {
                println!("  directory = \"{}\"", dir.display());
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{} Configuration is valid", style("✓").green());
            } else {
                for warning in &warnings {
                    println!("{} {}", style("warning:").yellow().bold(), warning);
                }
                println!();
                println!("{} warning(s)", warnings.len());
            }
        }
        Some(ConfigCommands::Init) => {
            if path.exists() {
                anyhow::bail!("Config file already exists at {}", path.display());
            }
            HubConfig::default().save(path)?;
            println!("Created {}", path.display());
        }
    }
    Ok(())
}

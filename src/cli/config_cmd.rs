use anyhow::Result;
use std::path::Path;

use crate::cli::output::OutputOptions;
use crate::core::config::AppConfig;

pub fn init(path: &Path, _opts: &OutputOptions) -> Result<()> {
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    match AppConfig::sample().save(path) {
        Ok(()) => {
            println!("Generated config at {}", path.display());
            println!("  Edit members, services and pricing, then run `geobill config check`.");
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check(path: &Path, _opts: &OutputOptions) -> Result<()> {
    let config = match AppConfig::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if issues.is_empty() {
        println!(
            "Config OK: {} member(s), {} service(s), {} pricing region(s)",
            config.members.len(),
            config.services.len(),
            config.pricing.len()
        );
    } else {
        eprintln!("Config has {} issue(s):", issues.len());
        for issue in &issues {
            eprintln!("  - {issue}");
        }
        std::process::exit(1);
    }
    Ok(())
}

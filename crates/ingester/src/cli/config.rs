//! Config command - show where the ingester keeps its files and what it read

use crate::cli::CommandStatus;
use ingester::config::global_config_path;
use ingester::{GlobalConfig, GlobalConfigLoad};
use ingester_logging::{ingester_home, logs_dir};

/// Arguments for the config command
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Show resolved paths in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run the config command. Never creates the global config.
pub fn run(args: ConfigArgs) -> anyhow::Result<CommandStatus> {
    let home = ingester_home();
    let config_path = global_config_path();
    let logs = logs_dir();

    let loaded = if config_path.exists() {
        match GlobalConfig::load_or_create(&config_path)? {
            GlobalConfigLoad::Loaded(config) => Some(config),
            GlobalConfigLoad::Created(_) => None,
        }
    } else {
        None
    };

    if args.json {
        let payload = serde_json::json!({
            "home": home.to_string_lossy(),
            "global_config": {
                "path": config_path.to_string_lossy(),
                "exists": config_path.exists(),
                "values": loaded,
            },
            "logs": logs.to_string_lossy(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(CommandStatus::Success);
    }

    println!("INGESTER CONFIGURATION");
    println!("======================");
    println!();
    println!("Home:     {}", home.display());
    println!(
        "Config:   {} ({})",
        config_path.display(),
        if config_path.exists() { "exists" } else { "not found" }
    );
    println!("Logs:     {}", logs.display());
    println!();

    match loaded {
        Some(config) => {
            let show = |s: &str| if s.trim().is_empty() { "(not set)".to_string() } else { s.to_string() };
            println!("projectsDir:   {}", show(&config.projects_dir));
            let roots = config.source_roots();
            if roots.is_empty() {
                println!("sourceDir:     (not set)");
            }
            for root in roots {
                println!("sourceDir:     {}", root.display());
            }
            println!("sourceFilters: {}", config.source_filters.join(", "));
            if let Some(template) = config.template_dir() {
                println!("templateDir:   {}", template.display());
            }
            println!("copyJobs:      {}", config.copy_jobs());
        }
        None => println!("Run `ingester` once to create the config."),
    }

    Ok(CommandStatus::Success)
}

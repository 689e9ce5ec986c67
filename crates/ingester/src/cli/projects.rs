//! Projects command - list projects in the order the ingest prompt offers them

use crate::cli::output::{format_time, print_table};
use crate::cli::{load_global_config, CommandStatus};
use ingester::config::project;
use ingester::{discover_projects, Project};
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the projects command
#[derive(Debug, clap::Args)]
pub struct ProjectsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRow {
    name: String,
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingest_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_error: Option<String>,
}

impl From<&Project> for ProjectRow {
    fn from(p: &Project) -> Self {
        let mut row = ProjectRow {
            name: p.name.clone(),
            path: p.full_path.clone(),
            prefix: None,
            ingest_count: None,
            config_error: None,
        };
        match project::load(&p.full_path) {
            Ok(Some(config)) => {
                row.prefix = Some(config.prefix);
                row.ingest_count = Some(config.ingest_count);
            }
            Ok(None) => {}
            Err(e) => row.config_error = Some(e.to_string()),
        }
        row
    }
}

/// Execute the projects command
pub fn run(args: ProjectsArgs) -> anyhow::Result<CommandStatus> {
    let (config_path, global) = load_global_config(!args.json)?;
    let projects_dir = global.projects_dir(&config_path)?;
    let projects = discover_projects(&projects_dir)?;

    if args.json {
        let rows: Vec<ProjectRow> = projects.iter().map(ProjectRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(CommandStatus::Success);
    }

    if projects.is_empty() {
        println!("no projects found in {}", projects_dir.display());
        return Ok(CommandStatus::Success);
    }

    let rows = projects
        .iter()
        .map(|p| {
            let row = ProjectRow::from(p);
            vec![
                row.name,
                row.prefix.unwrap_or_else(|| "-".to_string()),
                match (row.ingest_count, row.config_error) {
                    (Some(count), _) => count.to_string(),
                    (None, Some(_)) => "invalid config".to_string(),
                    (None, None) => "-".to_string(),
                },
                format_time(p.last_modified),
            ]
        })
        .collect();
    print_table(&["PROJECT", "PREFIX", "INGESTS", "MODIFIED"], rows);
    Ok(CommandStatus::Success)
}

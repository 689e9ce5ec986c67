//! New-project command

use crate::cli::{load_global_config, CommandStatus};
use console::style;
use ingester::create_project;
use tracing::warn;

/// Arguments for the new-project command
#[derive(Debug, clap::Args)]
pub struct NewProjectArgs {
    /// Directory name of the project
    pub name: String,

    /// File prefix; writes the project config right away
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Execute the new-project command
pub fn run(args: NewProjectArgs) -> anyhow::Result<CommandStatus> {
    let (config_path, global) = load_global_config(true)?;
    let projects_dir = global.projects_dir(&config_path)?;

    let template = global.template_dir().filter(|dir| {
        let exists = dir.is_dir();
        if !exists {
            warn!(template = %dir.display(), "templateDir does not exist, ignoring");
        }
        exists
    });

    let prefix = args.prefix.as_deref().filter(|p| !p.trim().is_empty());
    let project = create_project(&projects_dir, &args.name, template.as_deref(), prefix)?;

    println!(
        "created project {} at {}",
        style(&project.name).green(),
        project.full_path.display()
    );
    if prefix.is_none() {
        println!("the prefix will be asked for on the first ingest.");
    }
    Ok(CommandStatus::Success)
}

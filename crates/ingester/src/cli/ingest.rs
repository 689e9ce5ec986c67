//! Ingest command - copy new source files into the next raw folder of a project

use crate::cli::error::HelpfulError;
use crate::cli::output::{copy_progress_bar, format_mb, format_size, print_table};
use crate::cli::prompt::Prompter;
use crate::cli::{load_global_config, reveal, CommandStatus};
use console::style;
use indicatif::ProgressBar;
use ingester::{
    create_project, discover_projects, find_project, run_ingest, IngestError, IngestEvent,
    IngestOptions, IngestOutcome, IngestSummary, Project, ProjectStore, SourceScanner,
};
use std::path::Path;
use std::sync::mpsc;
use tracing::{info, warn};

pub const EXIT_CHOICE: &str = "*** exit ***";
pub const NEW_PROJECT_CHOICE: &str = "*** new project ***";

/// Arguments for the ingest command
#[derive(Debug, Default, clap::Args)]
pub struct IngestArgs {
    /// Project to ingest into (skips the selection prompt)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Prefix for a project that has no config yet (skips the prefix prompt)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Maximum concurrent copies (default: copyJobs from the global config)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Stop starting new copies after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Scan and show the plan without copying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not open the file manager
    #[arg(long)]
    pub no_reveal: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// What the operator picked from the project list
#[derive(Debug, PartialEq, Eq)]
pub enum ProjectChoice {
    Exit,
    New,
    Existing(Project),
}

/// Offer exit, new project, then the projects in listing order.
pub fn choose_project(prompter: &dyn Prompter, projects: Vec<Project>) -> anyhow::Result<ProjectChoice> {
    let mut items = vec![EXIT_CHOICE.to_string(), NEW_PROJECT_CHOICE.to_string()];
    items.extend(projects.iter().map(|p| p.name.clone()));

    let choice = match prompter.select("Select the project to ingest in", &items)? {
        None | Some(0) => ProjectChoice::Exit,
        Some(1) => ProjectChoice::New,
        Some(i) => match projects.into_iter().nth(i - 2) {
            Some(project) => ProjectChoice::Existing(project),
            None => ProjectChoice::Exit,
        },
    };
    Ok(choice)
}

fn prompt_prefix(prompter: &dyn Prompter, given: Option<&str>) -> anyhow::Result<Option<String>> {
    let prefix = match given {
        Some(prefix) => prefix.to_string(),
        None => prompter.text("Enter the prefix the ingested files should get")?,
    };
    if prefix.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(prefix))
}

fn resolve_project(
    args: &IngestArgs,
    projects_dir: &Path,
    template: Option<&Path>,
    prompter: &dyn Prompter,
) -> anyhow::Result<Option<Project>> {
    if let Some(name) = &args.project {
        return Ok(Some(find_project(projects_dir, name)?));
    }

    let projects = discover_projects(projects_dir)?;
    if projects.is_empty() {
        println!("no projects found in {}", projects_dir.display());
    }

    match choose_project(prompter, projects)? {
        ProjectChoice::Exit => Ok(None),
        ProjectChoice::Existing(project) => Ok(Some(project)),
        ProjectChoice::New => {
            let name = prompter.text("Enter the name of the new project")?;
            if name.trim().is_empty() {
                println!("{}", style("project creation cancelled!").red());
                return Ok(None);
            }
            let Some(prefix) = prompt_prefix(prompter, args.prefix.as_deref())? else {
                println!("{}", style("project creation cancelled!").red());
                return Ok(None);
            };
            Ok(Some(create_project(projects_dir, &name, template, Some(&prefix))?))
        }
    }
}

/// Make sure the store holds a config, asking for a prefix when it has none.
/// Returns false when the operator gave no prefix.
fn ensure_project_config(
    store: &mut ProjectStore,
    project: &Project,
    given_prefix: Option<&str>,
    prompter: &dyn Prompter,
) -> anyhow::Result<bool> {
    if let Some(config) = store.config() {
        if given_prefix.is_some_and(|p| p != config.prefix) {
            warn!(project = %project.name, prefix = %config.prefix, "Project already has a prefix, ignoring --prefix");
        }
        return Ok(true);
    }

    println!(
        "the config for the project {} must be created!",
        style(&project.name).green()
    );
    match prompt_prefix(prompter, given_prefix)? {
        Some(prefix) => {
            store.init(&prefix)?;
            Ok(true)
        }
        None => {
            println!("{}", style("project configuration initialisation cancelled!").red());
            Ok(false)
        }
    }
}

/// Execute the ingest command
pub fn run(args: IngestArgs, prompter: &dyn Prompter) -> anyhow::Result<CommandStatus> {
    let reveal_enabled = !args.no_reveal && !args.json;

    let (config_path, global) = load_global_config(reveal_enabled)?;

    let projects_dir = match global.projects_dir(&config_path) {
        Ok(dir) => dir,
        Err(e) => {
            if reveal_enabled {
                reveal::reveal(&config_path);
            }
            return Err(e.into());
        }
    };
    let filters = global.validate(&config_path)?;
    let scanner = SourceScanner::new(filters);

    let template = global.template_dir().filter(|dir| {
        let exists = dir.is_dir();
        if !exists {
            warn!(template = %dir.display(), "templateDir does not exist, ignoring");
        }
        exists
    });

    let Some(project) = resolve_project(&args, &projects_dir, template.as_deref(), prompter)? else {
        return Ok(CommandStatus::Halted);
    };
    if !args.json {
        println!("the target is {}", style(&project.name).green());
    }

    let mut store = ProjectStore::open(&project.full_path)?;
    if !ensure_project_config(&mut store, &project, args.prefix.as_deref(), prompter)? {
        return Ok(CommandStatus::Halted);
    }

    let roots = global.source_roots();
    if !args.json {
        let listed: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
        println!(
            "searching in {} for files to ingest.",
            style(listed.join(", ")).green()
        );
    }

    let options = IngestOptions {
        jobs: args.jobs.filter(|j| *j > 0).unwrap_or_else(|| global.copy_jobs()),
        fail_fast: args.fail_fast,
        dry_run: args.dry_run,
    };
    info!(project = %project.name, jobs = options.jobs, dry_run = options.dry_run, "Starting ingest");

    let outcome = if args.json {
        run_ingest(&project, &mut store, &roots, &scanner, &options, None)?
    } else {
        let dry_run = options.dry_run;
        std::thread::scope(|scope| {
            let (tx, rx) = mpsc::channel();
            let renderer = scope.spawn(move || render_events(rx, dry_run));
            let outcome = run_ingest(&project, &mut store, &roots, &scanner, &options, Some(tx));
            if renderer.join().is_err() {
                warn!("Progress renderer panicked");
            }
            outcome
        })?
    };
    drop(store);

    report(outcome, &args, reveal_enabled)
}

fn render_events(rx: mpsc::Receiver<IngestEvent>, dry_run: bool) {
    let mut bar: Option<ProgressBar> = None;
    for event in rx {
        match event {
            IngestEvent::Scanned { issues, .. } => {
                if issues > 0 {
                    println!(
                        "{}",
                        style(format!("{} source paths could not be read", issues)).yellow()
                    );
                }
            }
            IngestEvent::Planned {
                ingest_number,
                target_folder,
                files,
                total_bytes,
            } => {
                println!("this is ingest {} for this project.", style(ingest_number).green());
                println!("targetFolderPath is {}", style(target_folder.display()).green());
                println!(
                    "preparing to ingest {} files with a size of {} mb.",
                    style(files).green(),
                    style(format_mb(total_bytes)).green()
                );
                if !dry_run {
                    bar = Some(copy_progress_bar(total_bytes));
                }
            }
            IngestEvent::Copy(progress) => {
                if let Some(pb) = &bar {
                    pb.set_position(progress.completed_bytes);
                }
            }
            IngestEvent::Marked { .. } => {
                if let Some(pb) = bar.take() {
                    pb.finish();
                }
            }
        }
    }
    if let Some(pb) = bar {
        pb.abandon();
    }
}

/// JSON payload for `--json` callers.
fn outcome_json(outcome: &IngestOutcome) -> serde_json::Value {
    match outcome {
        IngestOutcome::NothingToIngest { scan_issues } => serde_json::json!({
            "status": "nothing_to_ingest",
            "code": IngestError::NoFilesFound.code(),
            "scan_issues": scan_issues,
        }),
        IngestOutcome::DryRun { batch, scan_issues } => serde_json::json!({
            "status": "dry_run",
            "batch": batch,
            "scan_issues": scan_issues,
        }),
        IngestOutcome::Completed(summary) => serde_json::json!({
            "status": if summary.is_complete() { "completed" } else { "partial" },
            "summary": summary,
        }),
        IngestOutcome::PersistFailed { summary, error } => serde_json::json!({
            "status": "persist_failed",
            "code": error.code(),
            "message": error.to_string(),
            "summary": summary,
        }),
    }
}

fn report(outcome: IngestOutcome, args: &IngestArgs, reveal_enabled: bool) -> anyhow::Result<CommandStatus> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
    }

    match outcome {
        IngestOutcome::NothingToIngest { .. } => {
            if !args.json {
                println!("{}", style("Could not find any files to ingest.").red());
            }
            Ok(CommandStatus::Halted)
        }
        IngestOutcome::DryRun { batch, .. } => {
            if !args.json {
                let rows = batch
                    .files
                    .iter()
                    .map(|f| vec![f.path.display().to_string(), format_size(f.size)])
                    .collect();
                print_table(&["FILE", "SIZE"], rows);
                println!("dry run: nothing was copied, marked or saved.");
            }
            Ok(CommandStatus::Success)
        }
        IngestOutcome::Completed(summary) => {
            if !args.json {
                print_summary(&summary);
            }
            if reveal_enabled {
                reveal::reveal(summary.target_folder());
            }
            if summary.is_complete() {
                Ok(CommandStatus::Success)
            } else {
                Ok(CommandStatus::Partial)
            }
        }
        IngestOutcome::PersistFailed { summary, error } => {
            if !args.json {
                print_summary(&summary);
                eprint!("{}", HelpfulError::from(&error));
            }
            if reveal_enabled {
                reveal::reveal(summary.target_folder());
            }
            Ok(CommandStatus::Failed)
        }
    }
}

fn print_summary(summary: &IngestSummary) {
    println!(
        "ingested {} of {} files ({} mb) into {}",
        style(summary.copied_files).green(),
        summary.total_files,
        format_mb(summary.copied_bytes),
        style(summary.target_folder.display()).green()
    );
    if summary.resumed_files > 0 {
        println!(
            "{}",
            style(format!(
                "{} files were already in the target folder from an interrupted run",
                summary.resumed_files
            ))
            .yellow()
        );
    }

    let rows: Vec<Vec<String>> = summary
        .scan_issues
        .iter()
        .chain(summary.issues())
        .map(|issue| {
            vec![
                issue.path.display().to_string(),
                issue.code.to_string(),
                issue.message.clone(),
            ]
        })
        .collect();
    if !rows.is_empty() {
        println!(
            "{}",
            style(format!("{} problems, originals of failed files were left in place:", rows.len())).red()
        );
        print_table(&["PATH", "CODE", "DETAIL"], rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::prompt::scripted::ScriptedPrompter;
    use std::path::PathBuf;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn project(name: &str) -> Project {
        Project {
            name: name.to_string(),
            full_path: PathBuf::from("/projects").join(name),
            last_modified: SystemTime::now(),
        }
    }

    #[test]
    fn choose_project_lists_sentinels_first() {
        let prompter = ScriptedPrompter::default().answer_select(Some(3));
        let choice = choose_project(&prompter, vec![project("New"), project("Old")]).unwrap();

        assert_eq!(choice, ProjectChoice::Existing(project("Old")));
        assert_eq!(
            prompter.seen_items.borrow()[0],
            vec![EXIT_CHOICE, NEW_PROJECT_CHOICE, "New", "Old"]
        );
    }

    #[test]
    fn choose_project_exit_and_escape() {
        let prompter = ScriptedPrompter::default()
            .answer_select(Some(0))
            .answer_select(None)
            .answer_select(Some(1));
        assert_eq!(choose_project(&prompter, vec![]).unwrap(), ProjectChoice::Exit);
        assert_eq!(choose_project(&prompter, vec![]).unwrap(), ProjectChoice::Exit);
        assert_eq!(choose_project(&prompter, vec![]).unwrap(), ProjectChoice::New);
    }

    #[test]
    fn blank_prefix_cancels_config_creation() {
        let dir = TempDir::new().unwrap();
        let project = Project {
            name: "Trip".into(),
            full_path: dir.path().to_path_buf(),
            last_modified: SystemTime::now(),
        };
        let mut store = ProjectStore::open(dir.path()).unwrap();
        let prompter = ScriptedPrompter::default().answer_text("   ");

        assert!(!ensure_project_config(&mut store, &project, None, &prompter).unwrap());
        assert!(!store.is_initialised());
    }

    #[test]
    fn given_prefix_skips_prompt() {
        let dir = TempDir::new().unwrap();
        let project = Project {
            name: "Trip".into(),
            full_path: dir.path().to_path_buf(),
            last_modified: SystemTime::now(),
        };
        let mut store = ProjectStore::open(dir.path()).unwrap();
        let prompter = ScriptedPrompter::default();

        assert!(ensure_project_config(&mut store, &project, Some("X_"), &prompter).unwrap());
        assert_eq!(store.config().map(|c| c.prefix.as_str()), Some("X_"));
    }

    fn summary_for(project: &str) -> IngestSummary {
        IngestSummary {
            project: project.to_string(),
            ingest_number: 4,
            target_folder: PathBuf::from("/projects").join(project).join("raw 4"),
            total_files: 1,
            total_bytes: 10,
            copied_files: 1,
            copied_bytes: 10,
            marked_files: 1,
            resumed_files: 0,
            failed_files: 0,
            mark_suffix: ".copied.2024-05-01_10-00-00.bak".to_string(),
            files: Vec::new(),
            scan_issues: Vec::new(),
        }
    }

    #[test]
    fn persist_failure_json_carries_summary() {
        let outcome = IngestOutcome::PersistFailed {
            summary: summary_for("Trip"),
            error: IngestError::PersistFailed {
                path: PathBuf::from("/projects/Trip/ingest.conf.json"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            },
        };
        let value = outcome_json(&outcome);
        assert_eq!(value["status"], "persist_failed");
        assert_eq!(value["code"], "PERSIST_FAILED");
        assert_eq!(value["summary"]["ingest_number"], 4);
        assert_eq!(value["summary"]["marked_files"], 1);

        let args = IngestArgs {
            json: true,
            ..IngestArgs::default()
        };
        assert_eq!(report(outcome, &args, false).unwrap(), CommandStatus::Failed);
    }

    #[test]
    fn new_project_from_prompts() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::default()
            .answer_select(Some(1))
            .answer_text("Holiday")
            .answer_text("HOL_");

        let project = resolve_project(&IngestArgs::default(), dir.path(), None, &prompter)
            .unwrap()
            .unwrap();
        assert_eq!(project.name, "Holiday");
        assert_eq!(
            ingester::config::project::load(&project.full_path)
                .unwrap()
                .map(|c| c.prefix),
            Some("HOL_".to_string())
        );
    }
}

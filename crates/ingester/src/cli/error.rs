//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use ingester::IngestError;
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
    /// Taxonomy code when the error came from the library
    pub code: Option<&'static str>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            code: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggestion for fixing the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    // === Common error constructors ===

    pub fn no_projects_dir(config_path: &Path) -> Self {
        Self::new("projectsDir is not configured")
            .with_context(format!("Global config: {}", config_path.display()))
            .with_suggestions([
                "TRY: Set \"projectsDir\" to the folder that holds your projects".to_string(),
                "TRY: Set \"sourceDir\" to your card or camera mount point".to_string(),
                "TRY: Check the current values: ingester config".to_string(),
            ])
            .with_code("NO_PROJECTS_DIR")
    }

    pub fn project_not_found(name: &str) -> Self {
        Self::new(format!("Project not found: {}", name))
            .with_context("Names are matched exactly against the projects directory")
            .with_suggestions([
                "TRY: List projects: ingester projects".to_string(),
                format!("TRY: Create it: ingester new-project \"{}\"", name),
            ])
            .with_code("PROJECT_NOT_FOUND")
    }

    pub fn project_locked(config_path: &Path) -> Self {
        Self::new("Another ingest is running for this project")
            .with_context(format!("Lock held on {}", config_path.display()))
            .with_suggestions([
                "TRY: Wait for the other run to finish".to_string(),
                "TRY: Check for a stuck ingester process".to_string(),
            ])
            .with_code("PROJECT_LOCKED")
    }

    pub fn persist_failed(path: &Path, reason: &str) -> Self {
        Self::new(format!("Could not save the ingest counter to {}", path.display()))
            .with_context(format!(
                "{}. Files were copied, but the next run may reuse this raw folder number",
                reason
            ))
            .with_suggestions([
                format!("TRY: Check permissions: ls -la {}", path.display()),
                "TRY: Fix ingestCount in the project config by hand before the next ingest"
                    .to_string(),
            ])
            .with_code("PERSIST_FAILED")
    }

    pub fn config_invalid(path: &Path, reason: &str) -> Self {
        Self::new(format!("Invalid config: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Validate the JSON: cat FILE | python -m json.tool".to_string(),
                "TRY: Delete the global config to have defaults written again".to_string(),
            ])
            .with_code("CONFIG_INVALID")
    }
}

impl From<&IngestError> for HelpfulError {
    fn from(err: &IngestError) -> Self {
        match err {
            IngestError::NoProjectsDir(path) => Self::no_projects_dir(path),
            IngestError::ProjectNotFound(name) => Self::project_not_found(name),
            IngestError::ProjectLocked(path) => Self::project_locked(path),
            IngestError::PersistFailed { path, source } => {
                Self::persist_failed(path, &source.to_string())
            }
            IngestError::ConfigInvalid { path, reason } => Self::config_invalid(path, reason),
            IngestError::ProjectsDirUnreadable { path, source } => {
                Self::new(format!("Failed to list projects in dir \"{}\"", path.display()))
                    .with_context(source.to_string())
                    .with_suggestion(format!("TRY: Check that the path exists: ls -la {}", path.display()))
                    .with_code(err.code())
            }
            IngestError::ProjectExists(path) => Self::new(err.to_string())
                .with_suggestion(format!(
                    "TRY: Ingest into it instead: ingester ingest --project \"{}\"",
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ))
                .with_code(err.code()),
            _ => Self::new(err.to_string()).with_code(err.code()),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Render any command error in the ERROR/CONTEXT/TRY layout.
pub fn render(err: &anyhow::Error) -> String {
    if let Some(helpful) = err.downcast_ref::<HelpfulError>() {
        return helpful.to_string();
    }
    if let Some(ingest) = err.downcast_ref::<IngestError>() {
        return HelpfulError::from(ingest).to_string();
    }
    format!("ERROR: {:#}\n", err)
}

/// Print an error as a JSON object on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let code = err
        .downcast_ref::<HelpfulError>()
        .and_then(|h| h.code)
        .or_else(|| err.downcast_ref::<IngestError>().map(IngestError::code))
        .unwrap_or("ERROR");
    let payload = serde_json::json!({
        "status": "error",
        "code": code,
        "message": format!("{:#}", err),
    });
    println!("{}", payload);
}

/// JSON payload for a deliberate stop, such as the first-run config creation.
pub fn json_halt(err: &IngestError) -> serde_json::Value {
    let status = match err {
        IngestError::ConfigMissing(_) => "config_created",
        _ => "halted",
    };
    serde_json::json!({
        "status": status,
        "code": err.code(),
        "message": err.to_string(),
    })
}

pub fn print_json_halt(err: &IngestError) {
    println!("{}", json_halt(err));
}

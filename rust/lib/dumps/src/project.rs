//! Project metadata recorded by the cookiecutter template.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::DumpError;

/// File written at the project root when the project was generated.
pub const CONTEXT_FILE: &str = ".cookiecutter.context.yml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectContext {
    pub project_name: String,
}

impl ProjectContext {
    /// Find the context file in `start` or one of its ancestors and load it.
    pub fn discover(start: &Path) -> Result<Self, DumpError> {
        let path = find_context_file(start).ok_or_else(|| {
            DumpError::NotFound(format!(
                "{} not found in {} or any parent directory",
                CONTEXT_FILE,
                start.display()
            ))
        })?;
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, DumpError> {
        debug!("loading project context from {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| DumpError::Io(format!("{}: {}", path.display(), e)))?;
        serde_yml::from_str(&content)
            .map_err(|e| DumpError::Parse(format!("{}: {}", path.display(), e)))
    }
}

fn find_context_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONTEXT_FILE))
        .find(|candidate| candidate.is_file())
}

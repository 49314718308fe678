//! Output directory management: timestamped stage files and safe lookup of
//! previously generated files by name.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// A directory holding every file the pipeline generates.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Use `dir` as the output directory. It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The configured directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `value` as pretty JSON to `{YYYYMMDD_HHMMSS}_output_{tag}.json`
    /// and return the file name.
    ///
    /// # Errors
    /// I/O and serialization failures.
    pub fn write_json<T: Serialize + ?Sized>(&self, tag: &str, value: &T) -> Result<String> {
        fs::create_dir_all(&self.dir)?;
        let ts = Local::now().format("%Y%m%d_%H%M%S");
        let name = format!("{ts}_output_{}.json", sanitize_component(tag));
        let path = self.dir.join(&name);

        let body = serde_json::to_string_pretty(value)?;
        fs::write(&path, body)?;
        info!(file = %name, "Wrote stage output");
        Ok(name)
    }

    /// Resolve `name` to a file inside the output directory.
    ///
    /// # Errors
    /// [`PipelineError::InvalidFilename`] for empty names, absolute paths, or
    /// anything that resolves outside the directory (including through
    /// symlinks); [`PipelineError::NotFound`] when the file does not exist.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let requested = Path::new(name);
        let plain = !name.is_empty()
            && requested
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !plain {
            debug!(name, "Rejected output file name");
            return Err(PipelineError::InvalidFilename(name.to_string()));
        }

        let root = self
            .dir
            .canonicalize()
            .map_err(|_| PipelineError::NotFound(name.to_string()))?;
        let resolved = root
            .join(requested)
            .canonicalize()
            .map_err(|_| PipelineError::NotFound(name.to_string()))?;

        if !resolved.starts_with(&root) {
            debug!(name, "Output file name escapes the output directory");
            return Err(PipelineError::InvalidFilename(name.to_string()));
        }
        if !resolved.is_file() {
            return Err(PipelineError::NotFound(name.to_string()));
        }
        Ok(resolved)
    }
}

/// Keep only `[A-Za-z0-9_-]`, replacing anything else with `_`, then trim
/// leading and trailing underscores.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    replaced.trim_matches('_').to_string()
}

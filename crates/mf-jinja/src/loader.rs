//! Script loading from the migration source folder

use crate::environment::SqlTemplateEnv;
use crate::error::{JinjaError, JinjaResult};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Loads named SQL scripts from a source folder
pub struct ScriptLoader {
    source_folder: PathBuf,
    env: SqlTemplateEnv<'static>,
}

impl ScriptLoader {
    /// Create a loader rooted at `source_folder`
    pub fn new(source_folder: impl Into<PathBuf>) -> Self {
        Self {
            source_folder: source_folder.into(),
            env: SqlTemplateEnv::new(),
        }
    }

    /// Folder scripts are resolved against
    pub fn source_folder(&self) -> &Path {
        &self.source_folder
    }

    /// Whether `filename` exists in the source folder
    pub fn exists(&self, filename: &str) -> JinjaResult<bool> {
        let path = self.source_folder.join(filename);
        file_exists(&path)
    }

    /// Load `filename`, rendering it against `template_data` when given.
    ///
    /// Returns an empty string when the file does not exist. Without
    /// template data the file contents are returned unmodified.
    pub fn load<T: Serialize>(
        &self,
        filename: &str,
        template_data: Option<&T>,
    ) -> JinjaResult<String> {
        let path = self.source_folder.join(filename);

        if !file_exists(&path)? {
            log::info!(
                "sql file {:?} does not exist - skipped execution",
                path.display().to_string()
            );
            return Ok(String::new());
        }

        let sql = fs::read_to_string(&path).map_err(|e| JinjaError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        match template_data {
            Some(data) => self.env.render(&path.display().to_string(), &sql, data),
            None => Ok(sql),
        }
    }
}

/// Distinguish "absent" from "present but inaccessible"
fn file_exists(path: &Path) -> JinjaResult<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(JinjaError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;

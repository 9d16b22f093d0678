//! Script naming conventions and discovery in the source folder.
//!
//! Fixed scripts (`setup.sql`, `fdw.up.sql`, `fdw.down.sql`) are addressed
//! by name. Per-version scripts carry the version as a leading decimal run:
//! `001_init.before.sql`, `2_users.after.up.sql`, `3.before.sql`, or the
//! plain numbered `4_orders.up.sql` / `4_orders.down.sql` pair.

use crate::error::{MigrateError, MigrateResult};
use mf_core::Version;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Runs once at the start of every migration
pub const SETUP_SCRIPT: &str = "setup.sql";

/// Sets up foreign data wrappers; templated with the foreign database
pub const FDW_UP_SCRIPT: &str = "fdw.up.sql";

/// Tears down what [`FDW_UP_SCRIPT`] created
pub const FDW_DOWN_SCRIPT: &str = "fdw.down.sql";

/// Role of a per-version script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Runs before the migration hook
    Before,
    /// The numbered migration itself (`N_name.up.sql`)
    Up,
    /// Runs after the migration hook
    After,
    /// Reverts `Up` when migrating below the version (`N_name.down.sql`)
    Down,
}

const BEFORE_SUFFIXES: [&str; 2] = [".before.up.sql", ".before.sql"];
const AFTER_SUFFIXES: [&str; 2] = [".after.up.sql", ".after.sql"];
// never executed; kept out of the plain `.down.sql` kind
const HOOK_DOWN_SUFFIXES: [&str; 2] = [".before.down.sql", ".after.down.sql"];

impl ScriptKind {
    /// Classify a script filename by suffix; `None` for anything else
    pub fn of(filename: &str) -> Option<Self> {
        let ends_with_any = |suffixes: &[&str]| suffixes.iter().any(|s| filename.ends_with(s));
        if ends_with_any(&BEFORE_SUFFIXES) {
            Some(ScriptKind::Before)
        } else if ends_with_any(&AFTER_SUFFIXES) {
            Some(ScriptKind::After)
        } else if ends_with_any(&HOOK_DOWN_SUFFIXES) {
            None
        } else if filename.ends_with(".up.sql") {
            Some(ScriptKind::Up)
        } else if filename.ends_with(".down.sql") {
            Some(ScriptKind::Down)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScriptKind::Before => "before",
            ScriptKind::Up => "up",
            ScriptKind::After => "after",
            ScriptKind::Down => "down",
        }
    }

    /// Whether `filename` is a script of this kind
    pub fn matches(self, filename: &str) -> bool {
        Self::of(filename) == Some(self)
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scripts found for one version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionScripts {
    pub before: Option<String>,
    pub up: Option<String>,
    pub after: Option<String>,
    pub down: Option<String>,
}

impl VersionScripts {
    pub fn get(&self, kind: ScriptKind) -> Option<&str> {
        self.slot(kind).as_deref()
    }

    fn slot(&self, kind: ScriptKind) -> &Option<String> {
        match kind {
            ScriptKind::Before => &self.before,
            ScriptKind::Up => &self.up,
            ScriptKind::After => &self.after,
            ScriptKind::Down => &self.down,
        }
    }

    fn slot_mut(&mut self, kind: ScriptKind) -> &mut Option<String> {
        match kind {
            ScriptKind::Before => &mut self.before,
            ScriptKind::Up => &mut self.up,
            ScriptKind::After => &mut self.after,
            ScriptKind::Down => &mut self.down,
        }
    }
}

/// Extract the version from a script filename.
///
/// The version is the leading run of decimal digits terminated by `_` or
/// `.`; `None` when there is no such prefix.
pub fn parse_migration_version(filename: &str) -> Option<Version> {
    let base = Path::new(filename).file_name()?.to_str()?;
    let end = base.find(['_', '.'])?;
    let digits = &base[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Find the `kind` script for `version`.
///
/// A missing source folder counts as empty. Two matching files are an
/// error rather than a silent pick.
pub fn find_version_script(
    folder: &Path,
    version: Version,
    kind: ScriptKind,
) -> MigrateResult<Option<String>> {
    let mut found: Vec<String> = list_files(folder)?
        .into_iter()
        .filter(|name| kind.matches(name) && parse_migration_version(name) == Some(version))
        .collect();

    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        _ => Err(MigrateError::Ambiguous {
            version,
            kind: kind.as_str(),
            files: found,
        }),
    }
}

/// Index every per-version script in `folder`, keyed by version
pub fn discover(folder: &Path) -> MigrateResult<BTreeMap<Version, VersionScripts>> {
    let mut index: BTreeMap<Version, VersionScripts> = BTreeMap::new();

    for name in list_files(folder)? {
        let Some(version) = parse_migration_version(&name) else {
            continue;
        };
        let Some(kind) = ScriptKind::of(&name) else {
            continue;
        };

        let slot = index.entry(version).or_default().slot_mut(kind);
        if let Some(existing) = slot.take() {
            return Err(MigrateError::Ambiguous {
                version,
                kind: kind.as_str(),
                files: vec![existing, name],
            });
        }
        *slot = Some(name);
    }

    Ok(index)
}

/// Sorted regular file names in `folder`
fn list_files(folder: &Path) -> MigrateResult<Vec<String>> {
    let scan_err = |source| MigrateError::Scan {
        folder: folder.display().to_string(),
        source,
    };

    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("source folder {} does not exist", folder.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(scan_err(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(scan_err)?;
        if !entry.file_type().map_err(scan_err)?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
#[path = "scripts_test.rs"]
mod tests;

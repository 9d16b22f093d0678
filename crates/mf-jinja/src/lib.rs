//! mf-jinja - Jinja templating layer for Migraflow
//!
//! This crate loads SQL scripts from a source folder and optionally renders
//! them against template data (the foreign database descriptor for FDW
//! scripts). A missing script is not an error: [`ScriptLoader::load`]
//! returns an empty string, meaning "nothing to do".

pub mod environment;
pub mod error;
pub mod loader;

pub use environment::SqlTemplateEnv;
pub use error::{JinjaError, JinjaResult};
pub use loader::ScriptLoader;

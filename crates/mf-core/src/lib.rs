//! mf-core - Core library for Migraflow
//!
//! This crate provides the shared types used across all Migraflow crates:
//! the migration [`Version`], connection options with their builder and
//! defaults, the foreign database descriptor used to template FDW scripts,
//! and the `migraflow.yml` project configuration.

pub mod config;
pub mod error;
pub mod foreign;
pub mod options;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use foreign::ForeignDatabase;
pub use options::{ConnectionOptions, ConnectionOptionsBuilder, SslMode};

/// Schema migration version: "the schema is at state N".
pub type Version = u32;

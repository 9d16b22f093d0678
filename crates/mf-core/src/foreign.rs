//! Foreign database descriptor used to template the FDW scripts.

use serde::{Deserialize, Serialize};

/// Connection details for the remote side of a foreign-data-wrapper link.
///
/// Serialized with the field names the FDW templates reference, e.g.
/// `{{ Hostname }}` or `{{ DBName }}`. Values are substituted verbatim,
/// so they must come from a trusted source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignDatabase {
    /// Local role the user mapping is created for
    #[serde(rename = "LocalUser", alias = "local_user")]
    pub local_user: String,

    /// Remote database name
    #[serde(rename = "DBName", alias = "db_name")]
    pub db_name: String,

    /// Remote host
    #[serde(rename = "Hostname", alias = "hostname")]
    pub hostname: String,

    /// Remote port
    #[serde(rename = "Port", alias = "port")]
    pub port: u16,

    /// Remote role
    #[serde(rename = "User", alias = "user")]
    pub user: String,

    /// Remote password
    #[serde(rename = "Password", alias = "password")]
    pub password: String,
}

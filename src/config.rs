//! Configuration Management
//!
//! Group configuration document and service settings

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};

/// Location of the group configuration inside a repository
pub const CONFIG_PATH: &str = ".github/label-juggler.yml";

/// Default address the webhook server binds to
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Group Definition
///
/// One mutual-exclusivity group. A plain string in the document is a glob
/// pattern; a sequence of strings is a set of literal label names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum GroupDefinition {
    /// Glob pattern matched against label names
    Pattern(String),

    /// Exact label names
    Literals(Vec<String>),
}

impl GroupDefinition {
    /// Create a pattern group
    pub fn pattern<S: Into<String>>(pattern: S) -> Self {
        GroupDefinition::Pattern(pattern.into())
    }

    /// Create a literal-name group
    pub fn literals<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupDefinition::Literals(names.into_iter().map(Into::into).collect())
    }
}

/// Group Configuration
///
/// The document stored at [`CONFIG_PATH`]. Group order is significant: a
/// label belongs to the first group that accepts it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct JugglerConfig {
    /// Ordered group definitions
    pub groups: Vec<GroupDefinition>,
}

impl JugglerConfig {
    /// Create a configuration from group definitions
    pub fn new(groups: Vec<GroupDefinition>) -> Self {
        Self { groups }
    }
}

/// Minimal shape of the configuration document
fn config_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["groups"],
        "properties": {
            "groups": {
                "type": "array",
                "items": {
                    "oneOf": [
                        { "type": "string" },
                        { "type": "array", "items": { "type": "string" } }
                    ]
                }
            }
        }
    })
}

/// Parse a group configuration document
///
/// # Arguments
/// - `content`: Raw YAML (JSON is accepted as a YAML subset)
///
/// # Errors
/// Returns [`Error::Configuration`] if the content is empty, is not YAML, or
/// does not have the shape `{ groups: [string | [string]] }`
pub fn parse_config(content: &str) -> Result<JugglerConfig> {
    if content.trim().is_empty() {
        return Err(Error::configuration("configuration document is empty"));
    }

    let document: serde_json::Value = serde_yaml::from_str(content)
        .map_err(|e| Error::configuration(format!("invalid YAML: {e}")))?;

    validate_shape(&document)?;

    serde_json::from_value(document)
        .map_err(|e| Error::configuration(format!("invalid groups: {e}")))
}

/// Check a parsed document against [`config_schema`]
fn validate_shape(document: &serde_json::Value) -> Result<()> {
    let schema = config_schema();
    let compiled = jsonschema::JSONSchema::compile(&schema)
        .map_err(|e| Error::configuration(format!("invalid configuration schema: {e}")))?;

    if let Err(errors) = compiled.validate(document) {
        let messages: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        return Err(Error::configuration(messages.join("; ")));
    }

    Ok(())
}

/// Load a group configuration from a local file
///
/// # Arguments
/// - `path`: Path to the YAML document
///
/// # Errors
/// If the file is missing, unreadable, or not a valid configuration
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<JugglerConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Configuration file not found: {}", path.display()),
        )
        .into());
    }

    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Search for the configuration file below the given directory
///
/// # Returns
/// `dir/.github/label-juggler.yml` if it exists
pub fn find_local_config_in(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(CONFIG_PATH);
    path.exists().then_some(path)
}

/// Search for the configuration file in the current directory
pub fn find_local_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_local_config_in(&cwd)
}

/// Sample configuration document written by `label-juggler init`
pub fn sample_config() -> &'static str {
    r#"# label-juggler keeps at most one label of each group on an issue or pull request.
# A string is a glob pattern, a list is a set of exact label names.
# When a label is applied, other labels of its group are removed.
groups:
  - "priority:*"
  - "status:*"
  - [bug, enhancement, question]
  - [wontfix, duplicate, invalid]
"#
}

/// Service Configuration
///
/// Settings for the webhook server and one-shot evaluations
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// GitHub access token
    pub access_token: String,

    /// Secret shared with the GitHub webhook (signature check disabled if None)
    pub webhook_secret: Option<String>,

    /// Address the webhook server binds to
    pub bind_address: String,

    /// Dry-run mode (compute removals without applying them)
    pub dry_run: bool,
}

impl ServiceConfig {
    /// Validate configuration
    ///
    /// # Errors
    /// - If the access token is empty
    /// - If the webhook secret is set but empty
    /// - If the bind address is not a socket address
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(Error::config_validation("Access token is required"));
        }

        if matches!(&self.webhook_secret, Some(secret) if secret.is_empty()) {
            return Err(Error::config_validation("Webhook secret cannot be empty"));
        }

        self.socket_addr()?;
        Ok(())
    }

    /// Parse the bind address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse().map_err(|_| {
            Error::config_validation(format!("Invalid bind address: {}", self.bind_address))
        })
    }
}

/// Parse repository string into owner and name
///
/// # Arguments
/// - `repo`: Repository string in "owner/repo" format
///
/// # Errors
/// Returns an error if the format is invalid
pub fn parse_repository(repo: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(Error::InvalidRepositoryFormat(repo.to_string()));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

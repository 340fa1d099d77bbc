//! # label-juggler
//!
//! Keeps GitHub issue and pull request labels mutually exclusive within
//! configured groups
//!
//! ## Features
//! - Glob and literal label groups, first matching group wins
//! - Newly applied labels replace older members of their group
//! - GitHub webhook server with signature verification
//! - Dry-run mode

use std::collections::HashSet;

pub mod config;
pub mod error;
pub mod github;
pub mod juggler;
pub mod matcher;
pub mod resolver;
pub mod server;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use config::{GroupDefinition, JugglerConfig, ServiceConfig};
pub use error::{Error, Result};
pub use github::{GitHubClient, Label, LabelableState, RepositoryGateway};
pub use juggler::{Evaluation, LabelJuggler};
pub use matcher::{GroupKey, GroupMatcher};
pub use resolver::ConflictResolver;

/// Evaluate one issue or pull request with a personal access token
///
/// Fetches the repository's group configuration and the current labels,
/// then removes every label that conflicts with `label_id`.
///
/// # Examples
///
/// ```rust,no_run
/// #[tokio::main]
/// async fn main() -> label_juggler::Result<()> {
///     let evaluation =
///         label_juggler::juggle_labels("your_github_token", "owner/repo", 42, Some("LA_kwDO"), false)
///             .await?;
///
///     println!("Removed: {:?}", evaluation.removed_ids());
///     Ok(())
/// }
/// ```
pub async fn juggle_labels(
    access_token: &str,
    repository: &str,
    number: u64,
    label_id: Option<&str>,
    dry_run: bool,
) -> Result<Evaluation> {
    let (owner, repo) = config::parse_repository(repository)?;
    let client = GitHubClient::new(access_token)?;
    let juggler = LabelJuggler::new(client, dry_run);

    let just_applied: HashSet<String> = label_id.map(str::to_string).into_iter().collect();
    juggler.evaluate(&owner, &repo, number, &just_applied).await
}

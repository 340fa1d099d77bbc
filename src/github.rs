//! GitHub API Client
//!
//! Reads labels and configuration of an issue or pull request and removes
//! labels, through the GitHub GraphQL API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::{parse_config, JugglerConfig, CONFIG_PATH};
use crate::error::{Error, Result};

/// Most recent labels fetched per issue or pull request
pub const LABELS_PAGE_SIZE: u32 = 100;

const STATE_QUERY: &str = r#"
query LabelableState($owner: String!, $repo: String!, $number: Int!, $expression: String!, $last: Int!) {
  repository(owner: $owner, name: $repo) {
    object(expression: $expression) {
      ... on Blob {
        text
      }
    }
    issueOrPullRequest(number: $number) {
      ... on Node {
        id
      }
      ... on Labelable {
        labels(last: $last) {
          nodes {
            id
            name
            createdAt
          }
        }
      }
    }
  }
}
"#;

const REMOVE_LABELS_MUTATION: &str = r#"
mutation RemoveLabels($labelableId: ID!, $labelIds: [ID!]!) {
  removeLabelsFromLabelable(input: { labelableId: $labelableId, labelIds: $labelIds }) {
    clientMutationId
  }
}
"#;

/// Label on an issue or pull request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// GraphQL node ID
    pub id: String,

    /// Label name
    pub name: String,

    /// Creation time, informational only
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Snapshot of an issue or pull request taken for one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct LabelableState {
    /// GraphQL node ID of the issue or pull request
    pub labelable_id: String,

    /// Group configuration of the repository
    pub config: JugglerConfig,

    /// Current labels, in API order
    pub labels: Vec<Label>,
}

/// Repository Gateway
///
/// The remote operations an evaluation needs
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// Fetch labels and group configuration of an issue or pull request
    ///
    /// # Errors
    /// - [`Error::NotFound`] if the repository or issue is gone
    /// - [`Error::Configuration`] if the configuration is missing or invalid
    async fn fetch_state(&self, owner: &str, repo: &str, number: u64) -> Result<LabelableState>;

    /// Remove labels from an issue or pull request in one call
    ///
    /// # Errors
    /// [`Error::Mutation`] if the removal is rejected or `label_ids` is empty
    async fn remove_labels(&self, labelable_id: &str, label_ids: &[String]) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl GraphQlError {
    fn is_not_found(&self) -> bool {
        self.kind.as_deref() == Some("NOT_FOUND")
    }
}

fn join_messages(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Deserialize)]
struct StateData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    object: Option<BlobNode>,
    issue_or_pull_request: Option<LabelableNode>,
}

#[derive(Debug, Deserialize)]
struct BlobNode {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelableNode {
    id: String,
    labels: Option<LabelConnection>,
}

#[derive(Debug, Deserialize)]
struct LabelConnection {
    #[serde(default)]
    nodes: Vec<Option<Label>>,
}

/// Turn a raw `LabelableState` query response into a snapshot
///
/// # Arguments
/// - `target`: Human readable "owner/repo#number", used in error messages
/// - `response`: Full GraphQL response body
///
/// # Errors
/// - [`Error::NotFound`] if the repository or issue/pull request is missing
/// - [`Error::Configuration`] if the configuration blob is missing or invalid
/// - [`Error::GraphQl`] for any other reported error
pub fn parse_state_response(target: &str, response: serde_json::Value) -> Result<LabelableState> {
    let GraphQlResponse { data, errors } =
        serde_json::from_value::<GraphQlResponse<StateData>>(response)?;

    let Some(RepositoryNode {
        object,
        issue_or_pull_request: Some(labelable),
    }) = data.and_then(|data| data.repository)
    else {
        if !errors.is_empty() && errors.iter().all(GraphQlError::is_not_found) {
            return Err(Error::not_found(target.to_string()));
        }
        if errors.is_empty() {
            return Err(Error::GraphQl(format!("no labelable returned for {target}")));
        }
        return Err(Error::GraphQl(join_messages(&errors)));
    };

    if !errors.is_empty() {
        return Err(Error::GraphQl(join_messages(&errors)));
    }

    let text = object
        .as_ref()
        .ok_or_else(|| Error::configuration(format!("{CONFIG_PATH} not found")))?
        .text
        .as_deref()
        .ok_or_else(|| Error::configuration(format!("{CONFIG_PATH} is not a text file")))?;

    let config = parse_config(text)?;

    let labels = labelable
        .labels
        .map(|connection| connection.nodes.into_iter().flatten().collect())
        .unwrap_or_default();

    Ok(LabelableState {
        labelable_id: labelable.id,
        config,
        labels,
    })
}

/// Check the response of the `RemoveLabels` mutation
///
/// # Errors
/// [`Error::Mutation`] if the response carries errors
pub fn check_mutation_response(response: serde_json::Value) -> Result<()> {
    let response: GraphQlResponse<serde_json::Value> = serde_json::from_value(response)
        .map_err(|e| Error::mutation(format!("unexpected response: {e}")))?;

    if !response.errors.is_empty() {
        return Err(Error::mutation(join_messages(&response.errors)));
    }

    Ok(())
}

/// GitHub API Client
///
/// [`RepositoryGateway`] backed by the GitHub GraphQL API
#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    /// Create a new GitHub client
    ///
    /// # Arguments
    /// - `access_token`: GitHub access token
    ///
    /// # Errors
    /// Returns an error if client initialization fails
    pub fn new(access_token: &str) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(access_token.to_string())
            .build()
            .map_err(Error::GitHubApi)?;

        Ok(Self::with_octocrab(octocrab))
    }

    /// Create a client from a prebuilt octocrab instance (e.g. an app installation)
    pub fn with_octocrab(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }
}

#[async_trait]
impl RepositoryGateway for GitHubClient {
    async fn fetch_state(&self, owner: &str, repo: &str, number: u64) -> Result<LabelableState> {
        let target = format!("{owner}/{repo}#{number}");
        debug!(%target, "Fetching labels and configuration");

        let payload = json!({
            "query": STATE_QUERY,
            "variables": {
                "owner": owner,
                "repo": repo,
                "number": number,
                "expression": format!("HEAD:{CONFIG_PATH}"),
                "last": LABELS_PAGE_SIZE,
            }
        });

        let response: serde_json::Value = self.octocrab.graphql(&payload).await?;
        parse_state_response(&target, response)
    }

    async fn remove_labels(&self, labelable_id: &str, label_ids: &[String]) -> Result<()> {
        if label_ids.is_empty() {
            return Err(Error::mutation("refusing to send an empty removal"));
        }

        debug!(labelable_id, ?label_ids, "Removing labels");

        let payload = json!({
            "query": REMOVE_LABELS_MUTATION,
            "variables": {
                "labelableId": labelable_id,
                "labelIds": label_ids,
            }
        });

        let response: serde_json::Value = self
            .octocrab
            .graphql(&payload)
            .await
            .map_err(|e| Error::mutation(e.to_string()))?;

        check_mutation_response(response)
    }
}

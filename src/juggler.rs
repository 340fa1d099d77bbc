//! Label Juggling
//!
//! The evaluation pipeline run for every triggering event:
//! fetch, resolve, and remove conflicting labels in one bulk call

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::github::{Label, RepositoryGateway};
use crate::resolver::ConflictResolver;
use crate::webhook::LabelEvent;

/// Outcome of one evaluation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Evaluation {
    /// Node ID of the evaluated issue or pull request
    pub labelable_id: String,

    /// Labels that conflicted and were (or would be) removed
    pub removed: Vec<Label>,

    /// Whether this is a dry run
    pub dry_run: bool,

    /// Whether a removal request was sent
    pub mutated: bool,
}

impl Evaluation {
    /// Whether any label conflicted
    pub fn has_changes(&self) -> bool {
        !self.removed.is_empty()
    }

    /// Identifiers of the removed labels
    pub fn removed_ids(&self) -> Vec<String> {
        self.removed.iter().map(|label| label.id.clone()).collect()
    }
}

/// Label Juggler
///
/// Runs evaluations against a [`RepositoryGateway`]. Holds no state between
/// evaluations; configuration and labels are fetched fresh every time.
pub struct LabelJuggler<G> {
    gateway: G,
    dry_run: bool,
}

impl<G: RepositoryGateway> LabelJuggler<G> {
    /// Create a new juggler
    ///
    /// # Arguments
    /// - `gateway`: Remote repository access
    /// - `dry_run`: Compute removals without applying them
    pub fn new(gateway: G, dry_run: bool) -> Self {
        Self { gateway, dry_run }
    }

    /// Gateway used by this juggler
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Whether removals are only computed
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Evaluate an issue or pull request after labels were applied
    ///
    /// # Arguments
    /// - `owner`: Repository owner
    /// - `repo`: Repository name
    /// - `number`: Issue or pull request number
    /// - `just_applied`: Node IDs of the labels that were just applied
    ///
    /// # Errors
    /// Fetch, configuration, and removal errors are returned unchanged.
    /// Nothing is removed when an error occurs before the removal call.
    #[instrument(skip(self, just_applied), fields(dry_run = self.dry_run))]
    pub async fn evaluate(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        just_applied: &HashSet<String>,
    ) -> Result<Evaluation> {
        let state = self.gateway.fetch_state(owner, repo, number).await?;
        debug!(
            labelable_id = %state.labelable_id,
            labels = state.labels.len(),
            groups = state.config.groups.len(),
            "Fetched labelable state"
        );

        let resolver = ConflictResolver::new(&state.config)?;
        let removed: Vec<Label> = resolver
            .conflicting_labels(&state.labels, just_applied)
            .into_iter()
            .cloned()
            .collect();

        let mut evaluation = Evaluation {
            labelable_id: state.labelable_id,
            removed,
            dry_run: self.dry_run,
            mutated: false,
        };

        if !evaluation.has_changes() {
            debug!("No conflicting labels");
            return Ok(evaluation);
        }

        let names: Vec<&str> = evaluation.removed.iter().map(|l| l.name.as_str()).collect();
        if self.dry_run {
            info!(labels = ?names, "Dry run, conflicting labels kept");
            return Ok(evaluation);
        }

        self.gateway
            .remove_labels(&evaluation.labelable_id, &evaluation.removed_ids())
            .await?;
        evaluation.mutated = true;
        info!(labels = ?names, "Removed conflicting labels");

        Ok(evaluation)
    }

    /// Evaluate the issue or pull request a webhook event refers to
    ///
    /// # Errors
    /// See [`LabelJuggler::evaluate`]
    pub async fn handle_event(&self, event: &LabelEvent) -> Result<Evaluation> {
        self.evaluate(&event.owner, &event.repo, event.number, &event.label_ids)
            .await
    }
}

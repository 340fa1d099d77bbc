//! Webhook Handling
//!
//! Signature verification and extraction of label events from GitHub
//! webhook deliveries

use std::collections::HashSet;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the event name
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the HMAC-SHA256 signature of the body
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header carrying the unique delivery ID
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Verify a GitHub webhook signature
///
/// # Arguments
/// - `body`: Raw request body
/// - `signature`: Value of the `X-Hub-Signature-256` header (`sha256=<hex>`)
/// - `secret`: Webhook secret
///
/// # Returns
/// True if the signature matches
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    computed.as_slice().ct_eq(&expected).into()
}

/// A label change the juggler has to evaluate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEvent {
    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Issue or pull request number
    pub number: u64,

    /// Node IDs of the labels that were just applied
    pub label_ids: HashSet<String>,
}

impl LabelEvent {
    /// "owner/repo#number"
    pub fn target(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[derive(Debug, Deserialize)]
struct PayloadLabel {
    node_id: String,
}

#[derive(Debug, Deserialize)]
struct PayloadLabelable {
    number: u64,
    #[serde(default)]
    labels: Vec<PayloadLabel>,
}

#[derive(Debug, Deserialize)]
struct PayloadOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PayloadRepository {
    name: String,
    owner: PayloadOwner,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    action: String,
    #[serde(default)]
    issue: Option<PayloadLabelable>,
    #[serde(default)]
    pull_request: Option<PayloadLabelable>,
    #[serde(default)]
    label: Option<PayloadLabel>,
    repository: PayloadRepository,
}

/// Whether an event/action pair triggers an evaluation
pub fn is_trigger(event: &str, action: &str) -> bool {
    matches!(
        (event, action),
        ("issues", "opened" | "labeled") | ("pull_request", "opened" | "labeled")
    )
}

/// Extract a label event from a webhook delivery
///
/// Only `issues` and `pull_request` deliveries with action `opened` or
/// `labeled` produce an event. A `labeled` delivery names the applied label;
/// for `opened` the first label of the new issue or pull request counts as
/// just applied.
///
/// # Arguments
/// - `event`: Value of the `X-GitHub-Event` header
/// - `body`: Raw JSON payload
///
/// # Errors
/// Returns an error if a triggering payload cannot be parsed
pub fn parse_event(event: &str, body: &[u8]) -> Result<Option<LabelEvent>> {
    if !matches!(event, "issues" | "pull_request") {
        return Ok(None);
    }

    let payload: EventPayload = serde_json::from_slice(body)?;
    if !is_trigger(event, &payload.action) {
        return Ok(None);
    }

    let labelable = match event {
        "issues" => payload.issue,
        _ => payload.pull_request,
    }
    .ok_or_else(|| {
        let field = if event == "issues" { "issue" } else { "pull_request" };
        Error::Json(serde::de::Error::missing_field(field))
    })?;

    let applied = match payload.action.as_str() {
        "labeled" => payload.label,
        _ => labelable.labels.into_iter().next(),
    };

    Ok(Some(LabelEvent {
        owner: payload.repository.owner.login,
        repo: payload.repository.name,
        number: labelable.number,
        label_ids: applied.into_iter().map(|label| label.node_id).collect(),
    }))
}

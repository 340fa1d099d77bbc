//! In-memory gateway used by the pipeline and server tests

use std::sync::Mutex;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::parse_config;
use crate::error::{Error, Result};
use crate::github::{Label, LabelableState, RepositoryGateway};

pub const LABELABLE_ID: &str = "I_kwDOAAAA";

pub fn label(id: &str, name: &str) -> Label {
    Label {
        id: id.to_string(),
        name: name.to_string(),
        created_at: None,
    }
}

/// `X-Hub-Signature-256` value for a body
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Serves one fixed issue and records every removal request
pub struct FakeGateway {
    pub config: String,
    pub labels: Vec<Label>,
    pub missing: bool,
    pub reject_removal: bool,
    pub fetches: Mutex<Vec<(String, String, u64)>>,
    pub removals: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeGateway {
    pub fn new(config: &str, labels: Vec<Label>) -> Self {
        Self {
            config: config.to_string(),
            labels,
            missing: false,
            reject_removal: false,
            fetches: Mutex::new(Vec::new()),
            removals: Mutex::new(Vec::new()),
        }
    }

    pub fn removals(&self) -> Vec<(String, Vec<String>)> {
        self.removals.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<(String, String, u64)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryGateway for FakeGateway {
    async fn fetch_state(&self, owner: &str, repo: &str, number: u64) -> Result<LabelableState> {
        self.fetches
            .lock()
            .unwrap()
            .push((owner.to_string(), repo.to_string(), number));

        if self.missing {
            return Err(Error::not_found(format!("{owner}/{repo}#{number}")));
        }

        Ok(LabelableState {
            labelable_id: LABELABLE_ID.to_string(),
            config: parse_config(&self.config)?,
            labels: self.labels.clone(),
        })
    }

    async fn remove_labels(&self, labelable_id: &str, label_ids: &[String]) -> Result<()> {
        assert!(!label_ids.is_empty(), "empty removal must never be sent");

        if self.reject_removal {
            return Err(Error::mutation("Resource not accessible by integration"));
        }

        self.removals
            .lock()
            .unwrap()
            .push((labelable_id.to_string(), label_ids.to_vec()));
        Ok(())
    }
}

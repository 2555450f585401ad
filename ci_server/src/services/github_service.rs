//! GitHub integration — webhook signature validation and commit status updates.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";
const SHA_PLACEHOLDER: &str = "{sha}";

/// Validate a GitHub webhook signature (X-Hub-Signature-256).
///
/// The signature must be exactly `sha256=` followed by the lowercase hex
/// HMAC-SHA256 of `payload` keyed with `secret`. Any failure yields `false`.
pub fn verify_signature(payload: &[u8], secret: &str, signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    let Some(digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    if !digest
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return false;
    }
    let sig_bytes = match hex::decode(digest) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&sig_bytes).is_ok()
}

/// Substitute the commit SHA into a statuses URL template.
///
/// Returns `None` when there is no template, or when the template needs a
/// SHA and none is available.
pub fn resolve_target(template: Option<&str>, commit_sha: Option<&str>) -> Option<String> {
    let template = template.filter(|t| !t.is_empty())?;
    if !template.contains(SHA_PLACEHOLDER) {
        return Some(template.to_string());
    }
    let sha = commit_sha.filter(|s| !s.is_empty())?;
    Some(template.replace(SHA_PLACEHOLDER, sha))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
}

impl CommitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Body of a commit status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitStatus {
    pub state: CommitState,
    pub description: String,
    pub context: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("status update rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Post `status` to the resolved statuses URL `target`.
    async fn post_status(
        &self,
        target: &str,
        status: &CommitStatus,
        credential: &str,
    ) -> Result<(), StatusError>;
}

/// Posts commit statuses to the GitHub REST API.
#[derive(Debug, Clone, Default)]
pub struct GithubStatusClient {
    client: reqwest::Client,
}

impl GithubStatusClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusReporter for GithubStatusClient {
    async fn post_status(
        &self,
        target: &str,
        status: &CommitStatus,
        credential: &str,
    ) -> Result<(), StatusError> {
        let resp = self
            .client
            .post(target)
            .header("Authorization", format!("Bearer {credential}"))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "pushci")
            .json(status)
            .send()
            .await?;

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StatusError::Rejected { status: code, body });
        }

        tracing::debug!(state = status.state.as_str(), url = target, "Commit status posted");
        Ok(())
    }
}

//! The subset of a GitHub push payload the pipeline needs.

use std::fmt;

use serde::Deserialize;

const BRANCH_REF_PREFIX: &str = "refs/heads/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repository_source_url: String,
    pub repository_full_name: String,
    pub branch_name: String,
    pub commit_sha: Option<String>,
    /// Statuses URL containing a `{sha}` placeholder.
    pub status_target_template: Option<String>,
}

/// Result of reading a webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(PushEvent),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotJson,
    Malformed(String),
    UnsupportedEvent(String),
    MissingRepository,
    NotBranchRef(Option<String>),
    BranchDeleted,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson => write!(f, "payload is not JSON"),
            Self::Malformed(detail) => write!(f, "malformed push payload: {detail}"),
            Self::UnsupportedEvent(event) => write!(f, "unsupported event type '{event}'"),
            Self::MissingRepository => write!(f, "repository clone_url or full_name missing"),
            Self::NotBranchRef(Some(reference)) => write!(f, "'{reference}' is not a branch"),
            Self::NotBranchRef(None) => write!(f, "ref missing"),
            Self::BranchDeleted => write!(f, "branch was deleted"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    reference: Option<String>,
    after: Option<String>,
    #[serde(default)]
    deleted: bool,
    repository: Option<RepositoryPayload>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    clone_url: Option<String>,
    full_name: Option<String>,
    statuses_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl PushEvent {
    /// Parse a webhook delivery. `event_type` is the `X-GitHub-Event` header, if any.
    pub fn parse(event_type: Option<&str>, body: &[u8]) -> ParseOutcome {
        if let Some(event) = event_type {
            if event != "push" {
                return ParseOutcome::Ignored(IgnoreReason::UnsupportedEvent(event.to_string()));
            }
        }

        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(_) => return ParseOutcome::Ignored(IgnoreReason::NotJson),
        };
        let payload: PushPayload = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return ParseOutcome::Ignored(IgnoreReason::Malformed(e.to_string())),
        };

        let repository = match payload.repository {
            Some(r) => r,
            None => return ParseOutcome::Ignored(IgnoreReason::MissingRepository),
        };
        let (Some(source_url), Some(full_name)) = (
            non_empty(repository.clone_url),
            non_empty(repository.full_name),
        ) else {
            return ParseOutcome::Ignored(IgnoreReason::MissingRepository);
        };

        if payload.deleted {
            return ParseOutcome::Ignored(IgnoreReason::BranchDeleted);
        }

        let branch = match payload.reference.as_deref() {
            Some(reference) => match reference.strip_prefix(BRANCH_REF_PREFIX) {
                Some(branch) if !branch.is_empty() => branch.to_string(),
                _ => {
                    return ParseOutcome::Ignored(IgnoreReason::NotBranchRef(Some(
                        reference.to_string(),
                    )))
                }
            },
            None => return ParseOutcome::Ignored(IgnoreReason::NotBranchRef(None)),
        };

        ParseOutcome::Parsed(PushEvent {
            repository_source_url: source_url,
            repository_full_name: full_name,
            branch_name: branch,
            commit_sha: non_empty(payload.after),
            status_target_template: non_empty(repository.statuses_url),
        })
    }
}

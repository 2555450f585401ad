//! CI server configuration — loaded from environment variables.

use std::path::PathBuf;

const DEFAULT_WORKSPACE_DIR: &str = "/tmp/ci";
const DEFAULT_LEDGER_DIR: &str = "data/repositories";

#[derive(Clone, Debug)]
pub struct CiConfig {
    /// GitHub webhook secret for HMAC validation. `None` disables validation.
    pub webhook_secret: Option<String>,
    /// GitHub token for commit status updates. `None` disables status posting.
    pub github_token: Option<String>,
    /// Root directory holding one working copy per repository.
    pub workspace_dir: PathBuf,
    /// Root directory of the build ledger.
    pub ledger_dir: PathBuf,
}

impl CiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let webhook_secret = non_empty("CI_WEBHOOK_SECRET");
        let github_token = non_empty("CI_GITHUB_TOKEN");
        let workspace_dir = non_empty("CI_WORKSPACE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE_DIR));
        let ledger_dir = non_empty("CI_LEDGER_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_DIR));

        if webhook_secret.is_none() {
            tracing::warn!("CI_WEBHOOK_SECRET not set -- webhook signature validation disabled");
        }
        if github_token.is_none() {
            tracing::warn!("CI_GITHUB_TOKEN not set -- GitHub status updates disabled");
        }

        Self {
            webhook_secret,
            github_token,
            workspace_dir,
            ledger_dir,
        }
    }
}

//! Persisted outcome of one pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// URL prefix under which a single build record is served.
pub const BUILD_URL_PREFIX: &str = "/builds/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failure,
}

impl BuildStatus {
    pub fn from_outcome(build_success: bool, tests_success: bool) -> Self {
        if build_success && tests_success {
            Self::Success
        } else {
            Self::Failure
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub id: String,
    pub repository: String,
    pub commit: Option<String>,
    pub branch: String,
    pub build_date: DateTime<Utc>,
    pub build_success: bool,
    pub tests_success: bool,
    pub status: BuildStatus,
    /// Sync, build and test transcripts, each entry prefixed by its command line.
    pub logs: String,
}

impl BuildRecord {
    pub fn url(&self) -> String {
        format!("{BUILD_URL_PREFIX}{}", self.id)
    }
}

/// Summary projection served by the build listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub id: String,
    pub repository: String,
    pub commit: Option<String>,
    pub build_date: DateTime<Utc>,
    pub status: BuildStatus,
    pub url: String,
}

impl From<&BuildRecord> for BuildSummary {
    fn from(record: &BuildRecord) -> Self {
        Self {
            id: record.id.clone(),
            repository: record.repository.clone(),
            commit: record.commit.clone(),
            build_date: record.build_date,
            status: record.status,
            url: record.url(),
        }
    }
}

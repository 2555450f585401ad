//! Build orchestrator: drives one webhook delivery through the pipeline.
//!
//! Received -> Verifying -> Parsed -> Syncing -> Building -> Testing ->
//! Reporting -> Persisted, with `Rejected` (bad signature) and `Ignored`
//! (not a buildable push) as early exits. Every parsed push produces exactly
//! one build record; nothing below this module can make the request fail.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::Instrument;

use crate::config::CiConfig;
use crate::models::build::{BuildRecord, BuildStatus};
use crate::models::push::{IgnoreReason, ParseOutcome, PushEvent};
use crate::services::build_service::BuildLedger;
use crate::services::command::{CommandError, CommandResult, CommandRunner};
use crate::services::github_service::{
    resolve_target, verify_signature, CommitState, CommitStatus, StatusReporter,
};
use crate::services::step_executor;
use crate::services::workspace::WorkspaceManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Verifying,
    Rejected,
    Ignored,
    Parsed,
    Syncing,
    Building,
    Testing,
    Reporting,
    Persisted,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Verifying => "verifying",
            Self::Rejected => "rejected",
            Self::Ignored => "ignored",
            Self::Parsed => "parsed",
            Self::Syncing => "syncing",
            Self::Building => "building",
            Self::Testing => "testing",
            Self::Reporting => "reporting",
            Self::Persisted => "persisted",
        }
    }
}

fn enter(stage: PipelineStage) {
    tracing::debug!(stage = stage.as_str(), "Pipeline stage");
    crate::metrics::stage_entered(stage.as_str());
}

/// One inbound webhook request, as seen by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct WebhookDelivery<'a> {
    /// `X-GitHub-Event` header.
    pub event_type: Option<&'a str>,
    /// `X-Hub-Signature-256` header.
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub record: BuildRecord,
    /// Whether the record reached the ledger.
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Rejected,
    Ignored(IgnoreReason),
    Built(BuildReport),
}

impl WebhookOutcome {
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Rejected => PipelineStage::Rejected,
            Self::Ignored(_) => PipelineStage::Ignored,
            Self::Built(_) => PipelineStage::Persisted,
        }
    }
}

/// Status target plus credential, present only when both are available.
struct StatusChannel<'a> {
    target: String,
    credential: &'a str,
    context: &'a str,
}

/// Results of the sync/build/test steps of one run.
#[derive(Debug, Default)]
struct StepOutcome {
    build_success: bool,
    tests_success: bool,
}

pub struct Orchestrator {
    config: CiConfig,
    runner: Arc<dyn CommandRunner>,
    reporter: Arc<dyn StatusReporter>,
    ledger: Arc<BuildLedger>,
    workspaces: WorkspaceManager,
}

impl Orchestrator {
    pub fn new(
        config: CiConfig,
        runner: Arc<dyn CommandRunner>,
        reporter: Arc<dyn StatusReporter>,
        ledger: Arc<BuildLedger>,
    ) -> Self {
        let workspaces = WorkspaceManager::new(config.workspace_dir.clone());
        Self {
            config,
            runner,
            reporter,
            ledger,
            workspaces,
        }
    }

    /// Handle one webhook delivery end to end.
    pub async fn handle(&self, delivery: WebhookDelivery<'_>) -> WebhookOutcome {
        enter(PipelineStage::Received);

        if let Some(secret) = self.config.webhook_secret.as_deref() {
            enter(PipelineStage::Verifying);
            if !verify_signature(delivery.body, secret, delivery.signature) {
                tracing::warn!("Webhook signature validation failed");
                enter(PipelineStage::Rejected);
                crate::metrics::webhook_outcome("rejected");
                return WebhookOutcome::Rejected;
            }
        }

        let event = match PushEvent::parse(delivery.event_type, delivery.body) {
            ParseOutcome::Parsed(event) => event,
            ParseOutcome::Ignored(reason) => {
                tracing::info!(%reason, "Webhook ignored");
                enter(PipelineStage::Ignored);
                crate::metrics::webhook_outcome("ignored");
                return WebhookOutcome::Ignored(reason);
            }
        };

        let build_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "pipeline",
            build_id = %build_id,
            repo = %event.repository_full_name,
            branch = %event.branch_name,
        );
        let report = self.run_pipeline(build_id, event).instrument(span).await;
        crate::metrics::webhook_outcome("built");
        WebhookOutcome::Built(report)
    }

    async fn run_pipeline(&self, build_id: String, event: PushEvent) -> BuildReport {
        enter(PipelineStage::Parsed);
        let build_date = Utc::now();
        let started = Instant::now();
        tracing::info!(commit = ?event.commit_sha, "Build started");

        let channel = self.status_channel(&event);
        if let Some(channel) = &channel {
            self.report(channel, CommitState::Pending, "Build started").await;
        }

        let mut logs = String::new();
        let mut steps = StepOutcome::default();
        if let Err(e) = self.run_steps(&event, &mut logs, &mut steps).await {
            tracing::error!("Pipeline step could not run: {e}");
            crate::metrics::error_recorded("command");
            let _ = writeln!(logs, "pipeline aborted: {e}");
        }

        enter(PipelineStage::Reporting);
        let (state, description) = final_status(&steps);
        if let Some(channel) = &channel {
            self.report(channel, state, description).await;
        }

        let status = BuildStatus::from_outcome(steps.build_success, steps.tests_success);
        let record = BuildRecord {
            id: build_id,
            repository: event.repository_full_name.clone(),
            commit: event.commit_sha.clone(),
            branch: event.branch_name.clone(),
            build_date,
            build_success: steps.build_success,
            tests_success: steps.tests_success,
            status,
            logs,
        };

        let persisted = match self
            .ledger
            .append(&event.repository_full_name, &record)
            .await
        {
            Ok(()) => {
                enter(PipelineStage::Persisted);
                true
            }
            Err(e) => {
                tracing::error!("Failed to record build: {e}");
                crate::metrics::error_recorded("ledger");
                false
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        crate::metrics::build_finished(status.as_str());
        crate::metrics::build_duration(duration_ms);
        tracing::info!(
            status = status.as_str(),
            build_success = steps.build_success,
            tests_success = steps.tests_success,
            duration_ms,
            "Build finished"
        );

        BuildReport { record, persisted }
    }

    /// Sync, build and test in order. Build and test are skipped when sync fails.
    ///
    /// `outcome` is filled in as steps complete, so a fault in a later step
    /// keeps what the earlier ones achieved.
    async fn run_steps(
        &self,
        event: &PushEvent,
        logs: &mut String,
        outcome: &mut StepOutcome,
    ) -> Result<(), CommandError> {
        let runner = self.runner.as_ref();
        let work_dir = self.workspaces.path_for(&event.repository_full_name);
        let _workspace = self.workspaces.lock(&work_dir).await;
        let should_clone = !tokio::fs::try_exists(&work_dir).await.unwrap_or(false);

        enter(PipelineStage::Syncing);
        let step_start = begin_step(logs, "sync");
        let sync = step_executor::sync_repository(
            runner,
            should_clone,
            &event.repository_source_url,
            &work_dir,
            &event.branch_name,
        )
        .await?;
        finish_step(logs, "sync", &sync, step_start);

        enter(PipelineStage::Building);
        let step_start = begin_step(logs, "build");
        let build = if sync.success {
            step_executor::build(runner, &work_dir).await?
        } else {
            step_executor::skipped("build")
        };
        finish_step(logs, "build", &build, step_start);
        outcome.build_success = sync.success && build.success;

        enter(PipelineStage::Testing);
        let step_start = begin_step(logs, "test");
        let test = if sync.success {
            step_executor::test(runner, &work_dir).await?
        } else {
            step_executor::skipped("test")
        };
        finish_step(logs, "test", &test, step_start);
        outcome.tests_success = test.success;

        Ok(())
    }

    fn status_channel<'a>(&'a self, event: &'a PushEvent) -> Option<StatusChannel<'a>> {
        let target = resolve_target(
            event.status_target_template.as_deref(),
            event.commit_sha.as_deref(),
        );
        match (self.config.github_token.as_deref(), target) {
            (Some(credential), Some(target)) => Some(StatusChannel {
                target,
                credential,
                context: &event.repository_full_name,
            }),
            _ => {
                tracing::info!("GitHub token or statuses URL missing; skipping status updates");
                None
            }
        }
    }

    /// Best-effort status post; failures are logged and dropped.
    async fn report(&self, channel: &StatusChannel<'_>, state: CommitState, description: &str) {
        let status = CommitStatus {
            state,
            description: description.to_string(),
            context: channel.context.to_string(),
        };
        if let Err(e) = self
            .reporter
            .post_status(&channel.target, &status, channel.credential)
            .await
        {
            tracing::warn!(state = state.as_str(), "GitHub status update failed: {e}");
            crate::metrics::status_post_failed(state.as_str());
        }
    }
}

fn begin_step(logs: &mut String, step: &'static str) -> Instant {
    let _ = writeln!(logs, "=== {step} ===");
    Instant::now()
}

fn finish_step(logs: &mut String, step: &'static str, result: &CommandResult, started: Instant) {
    logs.push_str(&result.output);
    crate::metrics::step_duration(step, started.elapsed().as_millis() as u64);
    if result.success {
        tracing::info!(step, "Step passed");
    } else {
        tracing::warn!(step, "Step failed");
    }
}

/// Terminal commit status: build failure outranks test failure.
fn final_status(steps: &StepOutcome) -> (CommitState, &'static str) {
    if !steps.build_success {
        (CommitState::Failure, "Build failed!")
    } else if !steps.tests_success {
        (CommitState::Failure, "Tests failed!")
    } else {
        (CommitState::Success, "Build succeeded and tests passed!")
    }
}

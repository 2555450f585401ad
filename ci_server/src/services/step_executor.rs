//! Repository sync, build and test steps.
//!
//! Every transcript returned here prefixes each command's output with the
//! command line that produced it (`$ git fetch ...`).

use std::path::{Path, PathBuf};

use crate::services::command::{command_line, CommandError, CommandResult, CommandRunner};

#[cfg(windows)]
const WRAPPER_NAME: &str = "gradlew.bat";
#[cfg(not(windows))]
const WRAPPER_NAME: &str = "gradlew";

fn to_argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Run one command and return its result with the command line prepended.
async fn run_logged(
    runner: &dyn CommandRunner,
    argv: &[String],
) -> Result<CommandResult, CommandError> {
    let result = runner.run(argv).await?;
    Ok(CommandResult {
        success: result.success,
        output: format!("$ {}\n{}", command_line(argv), result.output),
    })
}

/// Clone (or fetch) the repository, then force the local branch onto the remote one.
///
/// The checkout runs even when the clone/fetch failed; the returned
/// `success` reflects only the clone/fetch.
pub async fn sync_repository(
    runner: &dyn CommandRunner,
    should_clone: bool,
    source_url: &str,
    local_path: &Path,
    branch: &str,
) -> Result<CommandResult, CommandError> {
    let path = local_path.to_string_lossy().into_owned();
    let sync_argv = if should_clone {
        to_argv(["git", "clone", source_url, path.as_str()])
    } else {
        to_argv(["git", "-C", path.as_str(), "fetch"])
    };
    let sync = run_logged(runner, &sync_argv).await?;
    if !sync.success {
        tracing::warn!(repo_path = %path, "Repository sync failed");
    }

    let remote_branch = format!("origin/{branch}");
    let checkout_argv = to_argv([
        "git",
        "-C",
        path.as_str(),
        "checkout",
        "-B",
        branch,
        remote_branch.as_str(),
    ]);
    let checkout = run_logged(runner, &checkout_argv).await?;

    Ok(CommandResult {
        success: sync.success,
        output: sync.output + &checkout.output,
    })
}

/// Location of the build wrapper for the current platform.
pub fn wrapper_path(local_path: &Path) -> PathBuf {
    local_path.join(WRAPPER_NAME)
}

/// Compile the project without running its tests.
pub async fn build(
    runner: &dyn CommandRunner,
    local_path: &Path,
) -> Result<CommandResult, CommandError> {
    run_wrapper(runner, local_path, &["build", "-x", "test"]).await
}

/// Run the project's tests.
pub async fn test(
    runner: &dyn CommandRunner,
    local_path: &Path,
) -> Result<CommandResult, CommandError> {
    run_wrapper(runner, local_path, &["test"]).await
}

/// Result recorded for a step that was not attempted because sync failed.
pub fn skipped(step: &str) -> CommandResult {
    CommandResult::failure(format!("{step} skipped: repository sync failed"))
}

async fn run_wrapper(
    runner: &dyn CommandRunner,
    local_path: &Path,
    tasks: &[&str],
) -> Result<CommandResult, CommandError> {
    let wrapper = wrapper_path(local_path);
    let is_file = tokio::fs::metadata(&wrapper)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Ok(CommandResult::failure(format!(
            "Build wrapper not found: {}",
            wrapper.display()
        )));
    }

    let mut argv = vec![wrapper.to_string_lossy().into_owned()];
    argv.extend(tasks.iter().map(|t| t.to_string()));
    argv.push("--project-dir".to_string());
    argv.push(local_path.to_string_lossy().into_owned());

    run_logged(runner, &argv).await
}

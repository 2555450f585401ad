//! External process execution. Every command the server runs goes through here.
//!
//! stdout and stderr are piped and forwarded line by line into one channel,
//! so the captured output interleaves both streams in arrival order.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Outcome of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    /// Combined stdout/stderr, newline-terminated.
    pub output: String,
}

impl CommandResult {
    /// A failed result carrying an explanation instead of process output.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut output = message.into();
        if !output.ends_with('\n') {
            output.push('\n');
        }
        Self {
            success: false,
            output,
        }
    }
}

/// Faults that prevent a command from producing a [`CommandResult`].
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("empty command line")]
    EmptyCommand,
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Render an argument vector the way it is echoed into build logs.
pub fn command_line(argv: &[String]) -> String {
    argv.join(" ")
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv[0]` with the remaining arguments to completion.
    ///
    /// A nonzero exit status is a normal outcome (`success == false`); only
    /// failing to start or to wait for the process is an error.
    async fn run(&self, argv: &[String]) -> Result<CommandResult, CommandError>;
}

/// Runs commands as child processes of the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, argv: &[String]) -> Result<CommandResult, CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(tokio::spawn(forward_lines(stderr, tx.clone())));
        }
        drop(tx);

        let mut output = String::new();
        while let Some(line) = rx.recv().await {
            output.push_str(&line);
        }
        for forwarder in forwarders {
            if let Err(e) = forwarder.await {
                tracing::warn!(program = %program, "Output forwarder failed: {e}");
            }
        }

        let status = child.wait().await.map_err(|source| CommandError::Wait {
            program: program.clone(),
            source,
        })?;

        tracing::debug!(
            command = %command_line(argv),
            exit_code = status.code().unwrap_or(-1),
            "Command finished"
        );

        Ok(CommandResult {
            success: status.success(),
            output,
        })
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let mut line = String::from_utf8_lossy(&buf).into_owned();
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read command output: {e}");
                break;
            }
        }
    }
}

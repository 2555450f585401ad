//! Test doubles shared by unit tests across the crate.

use std::sync::Mutex;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::services::command::{command_line, CommandError, CommandResult, CommandRunner};

type Script = Box<dyn Fn(&[String]) -> Result<CommandResult, CommandError> + Send + Sync>;

/// Command runner that records every invocation and answers from a script.
pub struct ScriptedRunner {
    script: Script,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(script: impl Fn(&[String]) -> CommandResult + Send + Sync + 'static) -> Self {
        Self::fallible(move |argv| Ok(script(argv)))
    }

    pub fn fallible(
        script: impl Fn(&[String]) -> Result<CommandResult, CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|_| CommandResult {
            success: true,
            output: "ok\n".to_string(),
        })
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|argv| command_line(argv))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, argv: &[String]) -> Result<CommandResult, CommandError> {
        self.calls.lock().unwrap().push(argv.to_vec());
        (self.script)(argv)
    }
}

/// `X-Hub-Signature-256` value for `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

pub const PUSH_PAYLOAD: &str = r#"{"repository":{"clone_url":"https://x/y.git","full_name":"a/b","statuses_url":"https://api/x/statuses/{sha}"},"ref":"refs/heads/main","after":"deadbeef"}"#;

pub const PUSH_PAYLOAD_WITHOUT_STATUSES: &str = r#"{"repository":{"clone_url":"https://x/y.git","full_name":"a/b"},"ref":"refs/heads/main","after":"deadbeef"}"#;

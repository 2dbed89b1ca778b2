use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{Notification, Notifier};

/// Runs `program [args..] <recipient> <message>` for every notification
///
/// Exit status 0 counts as delivered. The child is killed if the send is
/// cancelled.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    fn command(&self, recipient: &str, message: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(recipient)
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    fn name(&self) -> &'static str {
        "command"
    }

    #[instrument(skip_all, fields(program = %self.program.display()))]
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let Some(recipient) = notification.recipient.as_deref() else {
            bail!("no recipient configured for {}", notification.alert.target);
        };

        let output = self
            .command(recipient, &notification.message)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.program.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            );
        }

        if !stdout.trim().is_empty() {
            debug!("notifier output: {}", stdout.trim());
        }
        Ok(())
    }
}

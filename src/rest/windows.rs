use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::RestTimePair;
use super::crontab::{CronCommands, merge_entries, parse_entries};
use super::error::{RestError, Result};
use super::overlap::validate;

/// Access to the crontab the windows are stored in
#[async_trait]
pub trait CrontabIo: Send + Sync {
    /// Current crontab text; empty when none exists
    async fn read(&self) -> Result<String>;

    /// Replace the whole crontab
    async fn write(&self, text: &str) -> Result<()>;
}

/// The `crontab` binary, optionally acting on another user's table
#[derive(Debug, Clone)]
pub struct SystemCrontab {
    user: Option<String>,
}

impl SystemCrontab {
    /// An empty `user` means the current user
    pub fn new(user: &str) -> Self {
        let user = user.trim();
        Self {
            user: (!user.is_empty()).then(|| user.to_string()),
        }
    }

    fn command(&self, arg: &str) -> Command {
        let mut command = Command::new("crontab");
        if let Some(user) = &self.user {
            command.arg("-u").arg(user);
        }
        command.arg(arg);
        command
    }
}

#[async_trait]
impl CrontabIo for SystemCrontab {
    async fn read(&self) -> Result<String> {
        let output = self.command("-l").output().await?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no crontab for") {
            return Ok(String::new());
        }
        Err(RestError::Crontab(stderr.trim().to_string()))
    }

    async fn write(&self, text: &str) -> Result<()> {
        let mut child = self
            .command("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RestError::Crontab(stderr.trim().to_string()));
        }
        Ok(())
    }
}

/// Reads and rewrites the maintenance windows
pub struct RestWindows {
    io: Arc<dyn CrontabIo>,
    commands: CronCommands,
    write_lock: Mutex<()>,
}

impl RestWindows {
    pub fn new(io: Arc<dyn CrontabIo>, commands: CronCommands) -> Self {
        Self {
            io,
            commands,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn get_rest_windows(&self) -> Result<Vec<RestTimePair>> {
        let text = self.io.read().await?;
        Ok(parse_entries(&text))
    }

    /// Validate `pairs` and replace the stored windows with them.
    /// Nothing is written when validation fails.
    pub async fn set_rest_windows(&self, pairs: &[RestTimePair]) -> Result<()> {
        validate(pairs)?;

        let _guard = self.write_lock.lock().await;
        let existing = self.io.read().await?;
        let merged = merge_entries(&existing, pairs, &self.commands);

        if merged == existing {
            debug!("Rest windows unchanged");
            return Ok(());
        }

        self.io.write(&merged).await?;
        info!(windows = pairs.len(), "Rest windows updated");
        Ok(())
    }
}

//! External process execution for the snapraid binary.
//!
//! The runner owns the single job slot: at most one snapraid invocation is
//! in flight at any time, tracked as a [`RunningJob`] and enforced here
//! rather than left to callers. Output from both pipes is streamed to the
//! caller in arrival order and the full transcript is kept in a bounded
//! history ring.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::models::{CommandOutput, RunningJob, SnapraidCommand};
use crate::logging::LogThrottle;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// The job slot is occupied; carries the running job's process id.
    #[error("a job is already running: {0}")]
    Busy(String),
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for child process: {0}")]
    Wait(#[from] std::io::Error),
}

struct ActiveJob {
    info: RunningJob,
    cancel: CancellationToken,
}

pub struct Runner {
    binary: String,
    log_dir: Option<PathBuf>,
    current: Mutex<Option<ActiveJob>>,
    history: RwLock<VecDeque<CommandOutput>>,
    history_limit: usize,
}

impl Runner {
    pub fn new(binary: impl Into<String>, log_dir: Option<PathBuf>, history_limit: usize) -> Self {
        Self {
            binary: binary.into(),
            log_dir,
            current: Mutex::new(None),
            history: RwLock::new(VecDeque::new()),
            history_limit,
        }
    }

    /// Execute one snapraid invocation, streaming each arrived output chunk
    /// to `chunk_tx` and returning the full transcript with the exit code.
    ///
    /// Fails with [`RunnerError::Busy`] if a job is already in flight; the
    /// slot is claimed and released here, never by callers.
    pub async fn execute(
        &self,
        command: SnapraidCommand,
        config_path: &str,
        extra_args: &[String],
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<CommandOutput, RunnerError> {
        let start = Utc::now();
        let process_id = format!("{}-{}", command, start.timestamp_millis());
        let cancel = CancellationToken::new();

        {
            let mut slot = self.current.lock().await;
            if let Some(active) = slot.as_ref() {
                return Err(RunnerError::Busy(active.info.process_id.clone()));
            }
            *slot = Some(ActiveJob {
                info: RunningJob {
                    command: command.to_string(),
                    config_path: config_path.to_string(),
                    start_time: start,
                    process_id: process_id.clone(),
                },
                cancel: cancel.clone(),
            });
        }

        let result = self
            .run_child(command, config_path, extra_args, chunk_tx, start, &cancel)
            .await;

        // Release the slot on every exit path. Abort may already have
        // cleared it, or a newer job may own it by now.
        {
            let mut slot = self.current.lock().await;
            if slot
                .as_ref()
                .is_some_and(|a| a.info.process_id == process_id)
            {
                *slot = None;
            }
        }

        let output = result?;
        self.record(output.clone()).await;
        Ok(output)
    }

    async fn run_child(
        &self,
        command: SnapraidCommand,
        config_path: &str,
        extra_args: &[String],
        chunk_tx: mpsc::Sender<String>,
        start: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, RunnerError> {
        let mut args: Vec<String> = vec![
            command.as_str().to_string(),
            "-c".to_string(),
            config_path.to_string(),
        ];
        if let Some(dir) = &self.log_dir {
            // the child writes the log itself and needs the directory there
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), error = %e, "Could not create log directory");
            }
            let log_name = format!("{}-{}.log", command, start.format("%Y%m%d-%H%M%S"));
            args.push("-l".to_string());
            args.push(dir.join(log_name).to_string_lossy().into_owned());
        }
        args.extend(extra_args.iter().cloned());

        let invocation = format!("{} {}", self.binary, args.join(" "));
        info!(command = %command, invocation = %invocation, "Spawning snapraid");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RunnerError::Spawn {
                binary: self.binary.clone(),
                source: e,
            })?;

        // Drain stdout and stderr concurrently. A child that fills one pipe
        // while blocked writing the other would deadlock a sequential read.
        let (tx, mut rx) = mpsc::channel::<String>(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain_stream(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stream(stderr, tx.clone()));
        }
        drop(tx);

        let throttle = LogThrottle::new(Duration::from_millis(500));
        let mut transcript = String::new();
        let mut killed = false;

        loop {
            tokio::select! {
                chunk = rx.recv() => {
                    let Some(chunk) = chunk else { break };
                    if throttle.should_log() {
                        debug!(bytes = chunk.len(), "Output chunk");
                    }
                    transcript.push_str(&chunk);
                    // receiver may be gone; streaming is best-effort
                    let _ = chunk_tx.send(chunk).await;
                }
                _ = cancel.cancelled(), if !killed => {
                    warn!(command = %command, "Abort requested, killing child process");
                    let _ = child.start_kill();
                    killed = true;
                }
            }
        }

        let status = child.wait().await?;
        let exit_code = status.code();
        info!(command = %command, exit_code = ?exit_code, "Process finished");

        Ok(CommandOutput {
            command: invocation,
            output: transcript,
            timestamp: start,
            exit_code,
        })
    }

    /// Signal the tracked child to terminate. The slot is cleared
    /// immediately; the executing task still reaps the process. Returns
    /// whether a matching job was found.
    pub async fn abort(&self, process_id: &str) -> bool {
        let mut slot = self.current.lock().await;
        match slot.as_ref() {
            Some(active) if active.info.process_id == process_id => {
                active.cancel.cancel();
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the in-flight job, if any.
    pub async fn current_job(&self) -> Option<RunningJob> {
        self.current.lock().await.as_ref().map(|a| a.info.clone())
    }

    /// Completed invocations, oldest first.
    pub async fn history(&self) -> Vec<CommandOutput> {
        self.history.read().await.iter().cloned().collect()
    }

    async fn record(&self, output: CommandOutput) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history.write().await;
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(output);
    }
}

async fn drain_stream<R: AsyncRead + Unpin>(mut stream: R, tx: mpsc::Sender<String>) {
    let mut buf = [0u8; 8192];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "Stream read failed");
                break;
            }
        }
    }
}

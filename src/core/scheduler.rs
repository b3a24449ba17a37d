//! Cron-driven dispatch of snapraid runs.
//!
//! Each enabled schedule gets one live timer task. A fire re-reads the
//! persisted schedule (the file may have changed under the timer), skips
//! outright when the runner's job slot is occupied, and otherwise stamps
//! `lastRun`/`nextRun` before handing the command to the runner. A failed
//! run is logged and the schedule keeps firing; nothing disables it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::models::{Schedule, SnapraidCommand};
use crate::core::runner::Runner;
use crate::core::store::ScheduleStore;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
    #[error("schedule not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Input for `create_schedule`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchedule {
    pub name: String,
    pub command: SnapraidCommand,
    pub config_path: String,
    pub cron_expression: String,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Merge-patch for `update_schedule`: absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub command: Option<SnapraidCommand>,
    #[serde(default)]
    pub config_path: Option<String>,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// One output chunk from a scheduled run, tagged with its schedule.
#[derive(Debug, Clone)]
pub struct ScheduledChunk {
    pub schedule_id: Uuid,
    pub command: SnapraidCommand,
    pub chunk: String,
}

struct SchedulerInner {
    store: ScheduleStore,
    runner: Arc<Runner>,
    timers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    /// Serializes load-modify-save cycles against the store.
    write_lock: Mutex<()>,
    output_tx: Option<mpsc::Sender<ScheduledChunk>>,
}

/// Cheap-clone handle; timer tasks hold their own clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        store: ScheduleStore,
        runner: Arc<Runner>,
        output_tx: Option<mpsc::Sender<ScheduledChunk>>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                runner,
                timers: Mutex::new(HashMap::new()),
                write_lock: Mutex::new(()),
                output_tx,
            }),
        }
    }

    /// Read the persisted list and start a timer for every enabled entry.
    pub async fn load_schedules(&self) -> Result<Vec<Schedule>, SchedulerError> {
        let schedules = self.inner.store.load()?;
        for schedule in schedules.iter().filter(|s| s.enabled) {
            self.start_timer(schedule).await;
        }
        info!(count = schedules.len(), "Schedules loaded");
        Ok(schedules)
    }

    pub async fn create_schedule(&self, input: NewSchedule) -> Result<Schedule, SchedulerError> {
        validate_cron(&input.cron_expression)?;

        let now = Utc::now();
        let schedule = Schedule {
            id: Uuid::now_v7(),
            name: input.name,
            command: input.command,
            config_path: input.config_path,
            next_run: next_occurrence(&input.cron_expression),
            cron_expression: input.cron_expression,
            args: input.args,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
            last_run: None,
        };

        {
            let _guard = self.inner.write_lock.lock().await;
            let mut all = self.inner.store.load()?;
            all.push(schedule.clone());
            self.inner.store.save(&all)?;
        }

        if schedule.enabled {
            self.start_timer(&schedule).await;
        }

        info!(id = %schedule.id, name = %schedule.name, "Schedule created");
        Ok(schedule)
    }

    pub async fn update_schedule(
        &self,
        id: Uuid,
        patch: SchedulePatch,
    ) -> Result<Schedule, SchedulerError> {
        if let Some(expr) = &patch.cron_expression {
            validate_cron(expr)?;
        }

        let (previous, updated) = {
            let _guard = self.inner.write_lock.lock().await;
            let mut all = self.inner.store.load()?;
            let schedule = all
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(SchedulerError::NotFound(id))?;

            let previous = schedule.clone();

            if let Some(name) = patch.name {
                schedule.name = name;
            }
            if let Some(command) = patch.command {
                schedule.command = command;
            }
            if let Some(config_path) = patch.config_path {
                schedule.config_path = config_path;
            }
            if let Some(cron_expression) = patch.cron_expression {
                schedule.next_run = next_occurrence(&cron_expression);
                schedule.cron_expression = cron_expression;
            }
            if let Some(args) = patch.args {
                schedule.args = Some(args);
            }
            if let Some(enabled) = patch.enabled {
                schedule.enabled = enabled;
            }
            schedule.updated_at = Utc::now();

            let updated = schedule.clone();
            self.inner.store.save(&all)?;
            (previous, updated)
        };

        // The live timer must always reflect the persisted cron/command/
        // config of an enabled schedule.
        let retimed = previous.cron_expression != updated.cron_expression
            || previous.command != updated.command
            || previous.config_path != updated.config_path;

        match (previous.enabled, updated.enabled) {
            (false, true) => self.start_timer(&updated).await,
            (true, false) => self.stop_timer(id).await,
            (true, true) if retimed => {
                self.stop_timer(id).await;
                self.start_timer(&updated).await;
            }
            _ => {}
        }

        info!(id = %id, "Schedule updated");
        Ok(updated)
    }

    pub async fn delete_schedule(&self, id: Uuid) -> Result<(), SchedulerError> {
        self.stop_timer(id).await;

        let _guard = self.inner.write_lock.lock().await;
        let mut all = self.inner.store.load()?;
        let before = all.len();
        all.retain(|s| s.id != id);
        if all.len() == before {
            return Err(SchedulerError::NotFound(id));
        }
        self.inner.store.save(&all)?;

        info!(id = %id, "Schedule deleted");
        Ok(())
    }

    pub async fn get_schedules(&self) -> Result<Vec<Schedule>, SchedulerError> {
        Ok(self.inner.store.load()?)
    }

    pub async fn get_schedule(&self, id: Uuid) -> Result<Schedule, SchedulerError> {
        self.inner
            .store
            .load()?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(SchedulerError::NotFound(id))
    }

    /// Next fire time of every live timer, computed from the persisted cron
    /// expressions (distinct from the stored `nextRun` snapshot).
    pub async fn next_runs(&self) -> Result<HashMap<Uuid, Option<DateTime<Utc>>>, SchedulerError> {
        let schedules = self.inner.store.load()?;
        let timers = self.inner.timers.lock().await;

        Ok(timers
            .keys()
            .map(|id| {
                let next = schedules
                    .iter()
                    .find(|s| s.id == *id)
                    .and_then(|s| next_occurrence(&s.cron_expression));
                (*id, next)
            })
            .collect())
    }

    async fn start_timer(&self, schedule: &Schedule) {
        let Ok(cron) = CronSchedule::from_str(&schedule.cron_expression) else {
            // persisted expressions were validated at write time
            warn!(id = %schedule.id, "Unparseable cron expression, timer not started");
            return;
        };

        let id = schedule.id;
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = cron.upcoming(Utc).next() else {
                    debug!(id = %id, "Cron expression has no future occurrences");
                    break;
                };
                let wait = (next - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::from_millis(500));
                tokio::time::sleep(wait).await;
                scheduler.fire(id).await;
            }
        });

        let mut timers = self.inner.timers.lock().await;
        if let Some(old) = timers.insert(id, handle) {
            old.abort();
        }
    }

    async fn stop_timer(&self, id: Uuid) {
        if let Some(handle) = self.inner.timers.lock().await.remove(&id) {
            handle.abort();
        }
    }

    /// One timer tick. Never returns an error: a failed run must not take
    /// the timer down with it.
    async fn fire(&self, id: Uuid) {
        let schedules = match self.inner.store.load() {
            Ok(s) => s,
            Err(e) => {
                warn!(id = %id, error = %e, "Could not re-read schedules on fire");
                return;
            }
        };
        let Some(mut schedule) = schedules.into_iter().find(|s| s.id == id) else {
            debug!(id = %id, "Schedule vanished before fire");
            return;
        };
        if !schedule.enabled {
            return;
        }

        if self.inner.runner.current_job().await.is_some() {
            info!(name = %schedule.name, "Job slot busy, skipping scheduled run");
            return;
        }

        schedule.last_run = Some(Utc::now());
        schedule.next_run = next_occurrence(&schedule.cron_expression);
        if let Err(e) = self.persist(&schedule).await {
            warn!(id = %id, error = %e, "Failed to persist run timestamps");
        }

        let (tx, rx) = mpsc::channel::<String>(64);
        if let Some(output_tx) = self.inner.output_tx.clone() {
            tokio::spawn(forward_chunks(rx, output_tx, id, schedule.command));
        }

        let args = schedule.args.clone().unwrap_or_default();
        match self
            .inner
            .runner
            .execute(schedule.command, &schedule.config_path, &args, tx)
            .await
        {
            Ok(output) => {
                info!(name = %schedule.name, exit_code = ?output.exit_code, "Scheduled run finished");
            }
            Err(e) => {
                warn!(name = %schedule.name, error = %e, "Scheduled run failed");
            }
        }
    }

    async fn persist(&self, schedule: &Schedule) -> Result<(), SchedulerError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut all = self.inner.store.load()?;
        if let Some(existing) = all.iter_mut().find(|s| s.id == schedule.id) {
            *existing = schedule.clone();
        }
        self.inner.store.save(&all)?;
        Ok(())
    }
}

async fn forward_chunks(
    mut rx: mpsc::Receiver<String>,
    output_tx: mpsc::Sender<ScheduledChunk>,
    schedule_id: Uuid,
    command: SnapraidCommand,
) {
    while let Some(chunk) = rx.recv().await {
        let _ = output_tx
            .send(ScheduledChunk {
                schedule_id,
                command,
                chunk,
            })
            .await;
    }
}

fn validate_cron(expression: &str) -> Result<(), SchedulerError> {
    CronSchedule::from_str(expression)
        .map(|_| ())
        .map_err(|_| SchedulerError::InvalidCron(expression.to_string()))
}

pub(crate) fn next_occurrence(expression: &str) -> Option<DateTime<Utc>> {
    CronSchedule::from_str(expression).ok()?.upcoming(Utc).next()
}

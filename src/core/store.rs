//! Flat-JSON persistence for schedules.
//!
//! One document, `{ "schedules": [...] }`. The file is the sole source of
//! truth; live timers are derived from it and rebuilt at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::models::Schedule;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScheduleFile {
    schedules: Vec<Schedule>,
}

pub struct ScheduleStore {
    path: PathBuf,
}

impl ScheduleStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read all schedules. A missing file is an empty list, not an error.
    pub fn load(&self) -> Result<Vec<Schedule>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let file: ScheduleFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        Ok(file.schedules)
    }

    pub fn save(&self, schedules: &[Schedule]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = ScheduleFile {
            schedules: schedules.to_vec(),
        };
        let content = serde_json::to_string_pretty(&file).context("Failed to serialize schedules")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }
}

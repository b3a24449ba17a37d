use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// SnapRAID subcommands the daemon is willing to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapraidCommand {
    Status,
    Sync,
    Scrub,
    Diff,
    Check,
    Fix,
    List,
    Devices,
    Smart,
    Probe,
    Up,
    Down,
}

impl SnapraidCommand {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "status" => Some(Self::Status),
            "sync" => Some(Self::Sync),
            "scrub" => Some(Self::Scrub),
            "diff" => Some(Self::Diff),
            "check" => Some(Self::Check),
            "fix" => Some(Self::Fix),
            "list" => Some(Self::List),
            "devices" => Some(Self::Devices),
            "smart" => Some(Self::Smart),
            "probe" => Some(Self::Probe),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Sync => "sync",
            Self::Scrub => "scrub",
            Self::Diff => "diff",
            Self::Check => "check",
            Self::Fix => "fix",
            Self::List => "list",
            Self::Devices => "devices",
            Self::Smart => "smart",
            Self::Probe => "probe",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Commands whose transcript feeds the status parser after completion.
    pub fn produces_status(&self) -> bool {
        matches!(self, Self::Status | Self::Diff)
    }
}

impl std::fmt::Display for SnapraidCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one completed external-process invocation.
///
/// Immutable once constructed; kept in a bounded in-memory history ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    /// Reconstructed invocation string, e.g. `snapraid status -c /etc/snapraid.conf`
    pub command: String,
    /// Concatenated stdout+stderr in arrival order
    pub output: String,
    /// Invocation start time
    pub timestamp: DateTime<Utc>,
    /// None if the process was killed or crashed before exiting
    pub exit_code: Option<i32>,
}

/// The currently in-flight invocation. At most one exists system-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningJob {
    pub command: String,
    pub config_path: String,
    pub start_time: DateTime<Utc>,
    /// Locally-unique id, `<command>-<epochMillis>`
    pub process_id: String,
}

/// Structured projection of a `status` or `diff` transcript.
///
/// Derived, never authoritative: recomputed from raw text on every parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapRaidStatus {
    pub has_errors: bool,
    pub parity_up_to_date: bool,
    pub new_files: u64,
    pub modified_files: u64,
    pub deleted_files: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_files: Option<u64>,
    pub sync_in_progress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrub_percentage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_scrub_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_scrub_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_scrub_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragmented_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasted_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_space_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_used_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_free_gb: Option<f64>,
    pub disks: Vec<DiskStatusInfo>,
    pub scrub_history: Vec<ScrubHistoryPoint>,
    /// Full transcript, always retained for audit/debug
    pub raw_output: String,
}

/// One row of the per-disk status table.
///
/// Numeric columns default to 0 when the source table shows a `-` placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskStatusInfo {
    pub name: String,
    pub files: u64,
    pub fragmented_files: u64,
    pub excess_fragments: u64,
    pub wasted_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub use_percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrubHistoryPoint {
    pub days_ago: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Added,
    Removed,
    Updated,
    Moved,
    Copied,
    Restored,
    Equal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffFileInfo {
    pub file_path: String,
    pub status: DiffStatus,
}

/// Structured projection of a `diff` transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub equal_files: u64,
    pub added_files: u64,
    pub removed_files: u64,
    pub updated_files: u64,
    pub moved_files: u64,
    pub copied_files: u64,
    pub restored_files: u64,
    /// Sum of all seven category counts
    pub total_files: u64,
    pub files: Vec<DiffFileInfo>,
    pub raw_output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Ok,
    Error,
    Rehash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckFileInfo {
    pub file_path: String,
    pub status: CheckStatus,
    /// Only known for missing files, from the line following the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,
}

/// Structured projection of a `check` or `fix` transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub files: Vec<CheckFileInfo>,
    pub total_files: u64,
    pub error_count: u64,
    pub rehash_count: u64,
    pub ok_count: u64,
    pub raw_output: String,
}

/// One row of a `list` report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapRaidFileInfo {
    pub size: u64,
    pub date: String,
    pub time: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReport {
    pub files: Vec<SnapRaidFileInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_count: Option<u64>,
}

/// One row of a `devices` report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub major_minor: String,
    pub device: String,
    pub part_major_minor: String,
    pub partition: String,
    pub disk_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SmartStatus {
    Ok,
    Fail,
    Prefail,
    Logfail,
    Logerr,
    Selferr,
    Unknown,
}

/// One disk block of a `smart` report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartDiskInfo {
    pub name: String,
    pub device: String,
    pub status: SmartStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_on_hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_probability: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    Active,
    Standby,
    Idle,
}

impl PowerState {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "standby" => Some(Self::Standby),
            "idle" => Some(Self::Idle),
            _ => None,
        }
    }
}

/// One row of a `probe` report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeDiskInfo {
    pub name: String,
    pub device: String,
    pub status: PowerState,
}

/// A persisted scheduled job. The JSON file is the source of truth; live
/// timers are rebuilt from it at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: Uuid,
    pub name: String,
    pub command: SnapraidCommand,
    pub config_path: String,
    pub cron_expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
}

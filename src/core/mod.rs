pub mod models;
pub mod runner;
pub mod scheduler;
pub mod store;

pub use models::{
    CheckFileInfo, CheckReport, CheckStatus, CommandOutput, DeviceInfo, DiffFileInfo, DiffReport,
    DiffStatus, DiskStatusInfo, ListReport, PowerState, ProbeDiskInfo, RunningJob, Schedule,
    ScrubHistoryPoint, SmartDiskInfo, SmartStatus, SnapRaidFileInfo, SnapRaidStatus,
    SnapraidCommand,
};
pub use runner::{Runner, RunnerError};
pub use scheduler::{NewSchedule, SchedulePatch, ScheduledChunk, Scheduler, SchedulerError};
pub use store::ScheduleStore;

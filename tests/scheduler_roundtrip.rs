use chrono::Utc;
use snapweb::core::models::SnapraidCommand;
use snapweb::core::{NewSchedule, Runner, SchedulePatch, ScheduleStore, Scheduler, SchedulerError};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn stub_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

fn new_schedule(cron: &str, enabled: bool) -> NewSchedule {
    NewSchedule {
        name: "nightly sync".into(),
        command: SnapraidCommand::Sync,
        config_path: "/data/snapraid.conf".into(),
        cron_expression: cron.into(),
        args: None,
        enabled,
    }
}

fn make_scheduler(dir: &Path, binary: &str) -> Arc<Scheduler> {
    let store = ScheduleStore::new(dir.join("schedules.json"));
    let runner = Arc::new(Runner::new(binary, None, 10));
    Arc::new(Scheduler::new(store, runner, None))
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = make_scheduler(dir.path(), "true");

    let before = Utc::now();
    let created = scheduler
        .create_schedule(new_schedule("0 0 3 * * *", false))
        .await
        .unwrap();

    assert_eq!(created.name, "nightly sync");
    assert!(created.created_at >= before);
    assert!(created.last_run.is_none());
    // nextRun is computed at creation and lies in the future
    assert!(created.next_run.unwrap() > before);

    let fetched = scheduler.get_schedule(created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn invalid_cron_is_rejected_before_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = make_scheduler(dir.path(), "true");

    let result = scheduler
        .create_schedule(new_schedule("not a cron line", true))
        .await;
    assert!(matches!(result, Err(SchedulerError::InvalidCron(_))));

    assert!(scheduler.get_schedules().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_ids_are_distinguished() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = make_scheduler(dir.path(), "true");

    let id = uuid::Uuid::now_v7();
    assert!(matches!(
        scheduler.update_schedule(id, SchedulePatch::default()).await,
        Err(SchedulerError::NotFound(_))
    ));
    assert!(matches!(
        scheduler.delete_schedule(id).await,
        Err(SchedulerError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_is_a_merge_patch() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = make_scheduler(dir.path(), "true");

    let created = scheduler
        .create_schedule(new_schedule("0 0 3 * * *", false))
        .await
        .unwrap();

    let patch = SchedulePatch {
        name: Some("weekly scrub".into()),
        ..Default::default()
    };
    let updated = scheduler.update_schedule(created.id, patch).await.unwrap();

    assert_eq!(updated.name, "weekly scrub");
    // unspecified fields are retained
    assert_eq!(updated.command, created.command);
    assert_eq!(updated.cron_expression, created.cron_expression);
    assert_eq!(updated.config_path, created.config_path);
    assert!(updated.updated_at >= created.updated_at);
}

#[tokio::test]
async fn delete_removes_from_the_persisted_list() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = make_scheduler(dir.path(), "true");

    let created = scheduler
        .create_schedule(new_schedule("0 0 3 * * *", false))
        .await
        .unwrap();
    scheduler.delete_schedule(created.id).await.unwrap();

    assert!(scheduler.get_schedules().await.unwrap().is_empty());
    assert!(matches!(
        scheduler.get_schedule(created.id).await,
        Err(SchedulerError::NotFound(_))
    ));
}

#[tokio::test]
async fn schedules_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let created = {
        let scheduler = make_scheduler(dir.path(), "true");
        scheduler
            .create_schedule(new_schedule("0 0 3 * * *", false))
            .await
            .unwrap()
    };

    // a fresh scheduler over the same file rebuilds from disk
    let scheduler = make_scheduler(dir.path(), "true");
    let loaded = scheduler.load_schedules().await.unwrap();
    assert_eq!(loaded, vec![created]);
}

#[tokio::test]
async fn enabled_schedule_has_a_live_timer() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = make_scheduler(dir.path(), "true");

    let created = scheduler
        .create_schedule(new_schedule("0 0 3 * * *", true))
        .await
        .unwrap();

    let next_runs = scheduler.next_runs().await.unwrap();
    assert!(next_runs.get(&created.id).copied().flatten().is_some());

    // disabling tears the timer down
    let patch = SchedulePatch {
        enabled: Some(false),
        ..Default::default()
    };
    scheduler.update_schedule(created.id, patch).await.unwrap();
    assert!(scheduler.next_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn due_fire_runs_the_command_and_stamps_last_run() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-ok", "echo scheduled run");

    let store = ScheduleStore::new(dir.path().join("schedules.json"));
    let runner = Arc::new(Runner::new(binary, None, 10));
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let scheduler = Arc::new(Scheduler::new(store, runner.clone(), Some(out_tx)));

    let created = scheduler
        .create_schedule(new_schedule("* * * * * *", true))
        .await
        .unwrap();

    // wait past at least one tick of the every-second expression
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let fetched = scheduler.get_schedule(created.id).await.unwrap();
    assert!(fetched.last_run.is_some());
    assert!(!runner.history().await.is_empty());

    // output chunks arrive tagged with the schedule
    let chunk = out_rx.recv().await.expect("scheduled output");
    assert_eq!(chunk.schedule_id, created.id);
    assert_eq!(chunk.command, SnapraidCommand::Sync);
    assert!(chunk.chunk.contains("scheduled run"));

    scheduler.delete_schedule(created.id).await.unwrap();
}

#[tokio::test]
async fn busy_runner_makes_a_due_fire_skip() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-slow", "sleep 30");

    let store = ScheduleStore::new(dir.path().join("schedules.json"));
    let runner = Arc::new(Runner::new(binary, None, 10));
    let scheduler = Arc::new(Scheduler::new(store, runner.clone(), None));

    // occupy the job slot
    let occupier = {
        let runner = runner.clone();
        tokio::spawn(async move {
            let (tx, _rx) = mpsc::channel(64);
            runner
                .execute(SnapraidCommand::Scrub, "/data/snapraid.conf", &[], tx)
                .await
        })
    };
    let job = loop {
        if let Some(job) = runner.current_job().await {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    let created = scheduler
        .create_schedule(new_schedule("* * * * * *", true))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;

    // the tick was dropped: no lastRun stamp, no second process
    let fetched = scheduler.get_schedule(created.id).await.unwrap();
    assert!(fetched.last_run.is_none());
    assert_eq!(runner.current_job().await.unwrap().process_id, job.process_id);

    scheduler.delete_schedule(created.id).await.unwrap();
    assert!(runner.abort(&job.process_id).await);
    let _ = tokio::time::timeout(Duration::from_secs(5), occupier)
        .await
        .unwrap();
}

use snapweb::core::models::SnapraidCommand;
use snapweb::core::{Runner, RunnerError};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Write an executable stub standing in for the snapraid binary.
fn stub_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

async fn wait_for_job(runner: &Runner) -> snapweb::core::models::RunningJob {
    for _ in 0..200 {
        if let Some(job) = runner.current_job().await {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never started");
}

#[tokio::test]
async fn execute_streams_output_and_returns_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(
        dir.path(),
        "snapraid-ok",
        "echo 'No error detected.'\necho 'diagnostic line' >&2\nexit 0",
    );

    let runner = Runner::new(binary, None, 10);
    let (tx, mut rx) = mpsc::channel(64);

    let output = runner
        .execute(SnapraidCommand::Status, "/data/snapraid.conf", &[], tx)
        .await
        .unwrap();

    assert_eq!(output.exit_code, Some(0));
    assert!(output.output.contains("No error detected."));
    assert!(output.output.contains("diagnostic line"));
    assert!(output.command.contains("status -c /data/snapraid.conf"));

    // streamed chunks concatenate to the transcript
    let mut streamed = String::new();
    while let Some(chunk) = rx.recv().await {
        streamed.push_str(&chunk);
    }
    assert_eq!(streamed, output.output);

    // slot released, invocation recorded
    assert!(runner.current_job().await.is_none());
    assert_eq!(runner.history().await.len(), 1);
}

#[tokio::test]
async fn status_transcript_parses_clean_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-ok", "echo 'No error detected.'");

    let runner = Runner::new(binary, None, 10);
    let (tx, _rx) = mpsc::channel(64);

    let output = runner
        .execute(SnapraidCommand::Status, "/data/snapraid.conf", &[], tx)
        .await
        .unwrap();
    assert_eq!(output.exit_code, Some(0));

    let status = snapweb::parse::status::parse(&output.output);
    assert!(!status.has_errors);
    assert!(status.parity_up_to_date);
}

#[tokio::test]
async fn non_zero_exit_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-fail", "echo 'DANGER!' >&2\nexit 3");

    let runner = Runner::new(binary, None, 10);
    let (tx, _rx) = mpsc::channel(64);

    let output = runner
        .execute(SnapraidCommand::Sync, "/data/snapraid.conf", &[], tx)
        .await
        .unwrap();

    assert_eq!(output.exit_code, Some(3));
    assert!(output.output.contains("DANGER!"));
}

#[tokio::test]
async fn second_execute_is_rejected_while_busy() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-slow", "sleep 5");

    let runner = std::sync::Arc::new(Runner::new(binary, None, 10));

    let first = {
        let runner = runner.clone();
        tokio::spawn(async move {
            let (tx, _rx) = mpsc::channel(64);
            runner
                .execute(SnapraidCommand::Sync, "/data/snapraid.conf", &[], tx)
                .await
        })
    };

    let job = wait_for_job(&runner).await;

    let (tx, _rx) = mpsc::channel(64);
    let second = runner
        .execute(SnapraidCommand::Status, "/data/snapraid.conf", &[], tx)
        .await;
    match second {
        Err(RunnerError::Busy(id)) => assert_eq!(id, job.process_id),
        other => panic!("expected Busy, got {other:?}"),
    }

    // the rejected call must not have corrupted the slot
    assert_eq!(runner.current_job().await.unwrap().process_id, job.process_id);

    assert!(runner.abort(&job.process_id).await);
    let _ = timeout(Duration::from_secs(5), first).await.unwrap();
}

#[tokio::test]
async fn abort_kills_the_child_and_clears_the_slot() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-slow", "sleep 30");

    let runner = std::sync::Arc::new(Runner::new(binary, None, 10));

    let task = {
        let runner = runner.clone();
        tokio::spawn(async move {
            let (tx, _rx) = mpsc::channel(64);
            runner
                .execute(SnapraidCommand::Scrub, "/data/snapraid.conf", &[], tx)
                .await
        })
    };

    let job = wait_for_job(&runner).await;
    assert!(runner.abort(&job.process_id).await);
    assert!(runner.current_job().await.is_none());

    // aborting an unknown id finds nothing
    assert!(!runner.abort("scrub-0").await);

    let output = timeout(Duration::from_secs(5), task)
        .await
        .expect("killed child must be reaped promptly")
        .unwrap()
        .unwrap();
    // killed by signal, no exit code
    assert_eq!(output.exit_code, None);
}

#[tokio::test]
async fn spawn_failure_clears_the_slot() {
    let runner = Runner::new("/nonexistent/snapraid-binary", None, 10);
    let (tx, _rx) = mpsc::channel(64);

    let result = runner
        .execute(SnapraidCommand::Status, "/data/snapraid.conf", &[], tx)
        .await;
    assert!(matches!(result, Err(RunnerError::Spawn { .. })));

    assert!(runner.current_job().await.is_none());
    assert!(runner.history().await.is_empty());
}

#[tokio::test]
async fn log_flag_is_passed_when_log_dir_is_configured() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-ok", "exit 0");
    let log_dir = dir.path().join("logs");

    let runner = Runner::new(binary, Some(log_dir.clone()), 10);
    let (tx, _rx) = mpsc::channel(64);

    let output = runner
        .execute(SnapraidCommand::Sync, "/data/snapraid.conf", &[], tx)
        .await
        .unwrap();

    assert!(output.command.contains(" -l "));
    assert!(output.command.contains(log_dir.to_str().unwrap()));
    assert!(output.command.contains("sync-"));
    assert!(output.command.ends_with(".log"));
}

#[tokio::test]
async fn extra_args_are_appended() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-ok", "exit 0");

    let runner = Runner::new(binary, None, 10);
    let (tx, _rx) = mpsc::channel(64);

    let output = runner
        .execute(
            SnapraidCommand::Smart,
            "/data/snapraid.conf",
            &["-d".to_string(), "d1".to_string()],
            tx,
        )
        .await
        .unwrap();

    assert!(output.command.ends_with("-d d1"));
}

#[tokio::test]
async fn history_ring_evicts_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let binary = stub_script(dir.path(), "snapraid-ok", "echo run");

    let runner = Runner::new(binary, None, 2);

    for _ in 0..3 {
        let (tx, _rx) = mpsc::channel(64);
        runner
            .execute(SnapraidCommand::Status, "/data/snapraid.conf", &[], tx)
            .await
            .unwrap();
    }

    assert_eq!(runner.history().await.len(), 2);
}

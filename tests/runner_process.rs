// tests/runner_process.rs
#![cfg(unix)]

use std::collections::BTreeMap;
use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

use devsup::engine::SupervisorEvent;
use devsup::exec::{EvalSource, ProjectLayout, RealRunnerBackend, RunnerBackend, RunnerSpec};
use devsup::sink::SinkEvent;
use devsup::types::RunnerId;
use devsup_test_utils::fakes::RecordingSink;
use devsup_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn shell_spec(script: &str, dir: &std::path::Path) -> RunnerSpec {
    RunnerSpec {
        argv: vec!["sh".into(), "-c".into(), script.into()],
        env: BTreeMap::from([("GREETING".to_string(), "hello".to_string())]),
        cwd: dir.to_path_buf(),
        kill_timeout: Duration::from_millis(500),
        clear: false,
        layout: ProjectLayout {
            root: dir.to_path_buf(),
            roots: vec![dir.to_path_buf()],
            config: None,
        },
        eval: None,
    }
}

async fn wait_for_exit(
    rx: &mut mpsc::UnboundedReceiver<SupervisorEvent>,
) -> Result<(RunnerId, Option<i32>), Box<dyn Error>> {
    loop {
        match timeout(Duration::from_secs(10), rx.recv()).await? {
            Some(SupervisorEvent::RunnerExited { runner, code }) => return Ok((runner, code)),
            Some(_) => continue,
            None => return Err("event channel closed".into()),
        }
    }
}

#[tokio::test]
async fn runner_output_env_and_exit_code() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = RecordingSink::new();

    let mut spec = shell_spec(
        r#"echo "$GREETING runner $DEVSUP_RUNNER_ID"; test -n "$DEVSUP_CONTROL_ADDR" && echo addr-set; echo "$DEVSUP_EVAL_FILENAME"; exit 3"#,
        dir.path(),
    );
    spec.eval = Some(EvalSource {
        code: "1 + 1".into(),
        filename: "[eval]".into(),
    });
    let mut backend = RealRunnerBackend::new(spec, tx, sink.clone());

    backend.spawn(RunnerId(5)).await;
    match rx.recv().await {
        Some(SupervisorEvent::RunnerSpawned { runner }) => assert_eq!(runner, RunnerId(5)),
        other => panic!("expected RunnerSpawned, got {other:?}"),
    }

    let (runner, code) = wait_for_exit(&mut rx).await?;
    assert_eq!(runner, RunnerId(5));
    assert_eq!(code, Some(3));

    // Output forwarding races the exit notification.
    let deadline = Instant::now() + Duration::from_secs(5);
    while sink.events().len() < 3 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let lines: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SinkEvent::Logging { data } => Some(data),
            SinkEvent::ServerReady => None,
        })
        .collect();
    assert_eq!(lines, ["hello runner 5", "addr-set", "[eval]"]);
    Ok(())
}

#[tokio::test]
async fn terminate_kills_the_process_tree() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let (tx, mut rx) = mpsc::unbounded_channel();

    // The child shell spawns a grandchild that would outlive a plain kill.
    let spec = shell_spec("sleep 30 & wait", dir.path());
    let mut backend = RealRunnerBackend::new(spec, tx, RecordingSink::new());

    backend.spawn(RunnerId(1)).await;
    assert!(matches!(
        rx.recv().await,
        Some(SupervisorEvent::RunnerSpawned { .. })
    ));

    let started = Instant::now();
    backend.terminate(RunnerId(1));
    backend.terminate(RunnerId(1));

    let (runner, code) = wait_for_exit(&mut rx).await?;
    assert_eq!(runner, RunnerId(1));
    assert_eq!(code, None, "killed by a signal");
    assert!(started.elapsed() < Duration::from_secs(10));
    Ok(())
}

#[tokio::test]
async fn missing_program_reports_spawn_failure() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut spec = shell_spec("", dir.path());
    spec.argv = vec!["devsup-no-such-program-xyz".into()];
    let mut backend = RealRunnerBackend::new(spec, tx, RecordingSink::new());

    backend.spawn(RunnerId(1)).await;
    match rx.recv().await {
        Some(SupervisorEvent::SpawnFailed { runner, error }) => {
            assert_eq!(runner, RunnerId(1));
            assert!(error.contains("devsup-no-such-program-xyz"));
        }
        other => panic!("expected SpawnFailed, got {other:?}"),
    }
    Ok(())
}

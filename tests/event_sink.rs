// tests/event_sink.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use devsup::config::PluginConfig;
use devsup::exec::compiler::substitute_path;
use devsup::sink::{ChannelSink, EventSink, SharedSink, SinkEvent};
use devsup::watch::plugin_listener;
use devsup_test_utils::builders::change;
use devsup_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn sink_events_serialize_with_event_tag() -> TestResult {
    let logging = serde_json::to_string(&SinkEvent::Logging {
        data: "listening on :3000".into(),
    })?;
    assert_eq!(logging, r#"{"event":"logging","data":"listening on :3000"}"#);
    assert_eq!(serde_json::to_string(&SinkEvent::ServerReady)?, r#"{"event":"serverReady"}"#);
    Ok(())
}

#[test]
fn path_is_substituted_or_appended() {
    let path = Path::new("/p/src/a.ts");
    let with_placeholder: Vec<String> = vec!["tsc".into(), "--file={path}".into()];
    assert_eq!(substitute_path(&with_placeholder, path), ["tsc", "--file=/p/src/a.ts"]);

    let without: Vec<String> = vec!["lint".into()];
    assert_eq!(substitute_path(&without, path), ["lint", "/p/src/a.ts"]);
}

#[tokio::test]
async fn channel_sink_forwards_events() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = ChannelSink::new(tx);

    sink.emit(SinkEvent::ServerReady);
    assert_eq!(rx.recv().await, Some(SinkEvent::ServerReady));

    drop(rx);
    // A closed receiver is not an error.
    sink.emit(SinkEvent::ServerReady);
}

#[cfg(unix)]
#[tokio::test]
async fn plugin_listener_runs_its_command_for_matching_files() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink: SharedSink = Arc::new(ChannelSink::new(tx));

    let cfg = PluginConfig {
        allow: vec!["**/*.css".into()],
        ignore: vec!["vendor/**".into()],
        cmd: Some(vec!["echo".into(), "built".into(), "{path}".into()]),
        core_ignore: vec![],
    };
    let listener = plugin_listener("css", &cfg, dir.path(), sink)?;
    assert_eq!(listener.name(), "plugin:css");

    assert!(!listener.offer(&change("src/app.js")));
    assert!(!listener.offer(&change("vendor/reset.css")));
    assert!(listener.offer(&change("src/theme.css")));

    let event = with_timeout(rx.recv()).await;
    assert_eq!(
        event,
        Some(SinkEvent::Logging {
            data: "built /project/src/theme.css".into()
        })
    );
    Ok(())
}

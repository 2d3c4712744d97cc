// tests/config_loading.rs

use std::error::Error;
use std::io::Write;

use tempfile::{NamedTempFile, tempdir};

use devsup::config::{ConfigOverrides, load_and_validate, load_with_overrides};
use devsup::errors::DevsupError;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_is_loaded() -> TestResult {
    let file = write_config(
        r#"
[runner]
cmd = ["node", "server.js"]
env = { PORT = "3000" }
kill_timeout_ms = 500
clear = true

[watch]
roots = ["src", "lib"]
match = ["**/*.js"]
ignore = ["**/*.test.js"]
deps = 1

[compile]
cmd = ["tsc", "{path}"]
config = "tsconfig.json"

[plugin.css]
match = ["**/*.css"]
cmd = ["npm", "run", "css"]
core_ignore = ["**/*.css"]
"#,
    );

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.runner.cmd, ["node", "server.js"]);
    assert_eq!(cfg.runner.env.get("PORT").map(String::as_str), Some("3000"));
    assert_eq!(cfg.runner.kill_timeout_ms, 500);
    assert!(cfg.runner.clear);
    assert_eq!(cfg.watch.roots, ["src", "lib"]);
    assert_eq!(cfg.watch.allow, ["**/*.js"]);
    assert_eq!(cfg.watch.deps, 1);
    assert_eq!(cfg.watch.deps_dir, "node_modules");
    let compile = cfg.compile.as_ref().expect("compile section");
    assert_eq!(compile.config.as_deref(), Some("tsconfig.json"));
    assert_eq!(cfg.plugin_core_ignores(), ["**/*.css"]);
    Ok(())
}

#[test]
fn defaults_apply_to_minimal_config() -> TestResult {
    let file = write_config("[runner]\ncmd = [\"./app\"]\n");

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.runner.kill_timeout_ms, 2000);
    assert!(!cfg.runner.clear);
    assert_eq!(cfg.watch.roots, ["."]);
    assert!(cfg.watch.allow.is_empty());
    assert_eq!(cfg.watch.deps, 0);
    assert!(cfg.compile.is_none());
    assert!(cfg.plugin.is_empty());
    Ok(())
}

#[test]
fn missing_runner_command_is_config_error() {
    let file = write_config("[watch]\nroots = [\"src\"]\n");

    match load_and_validate(file.path()) {
        Err(DevsupError::ConfigError(msg)) => assert!(msg.contains("[runner].cmd")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        "[runner]\ncmd = [\"x\"]\n[watch]\ndeps = -2\n",
        "[runner]\ncmd = [\"x\"]\n[watch]\nroots = []\n",
        "[runner]\ncmd = [\"x\"]\n[compile]\ncmd = []\n",
        "[runner]\ncmd = [\"x\"]\n[plugin.p]\ncmd = []\n",
        "[runner]\ncmd = [\"x\"]\n[plugin.p]\nmatch = [\"[\"]\n",
    ];
    for contents in cases {
        let file = write_config(contents);
        match load_and_validate(file.path()) {
            Err(DevsupError::ConfigError(_)) => {}
            other => panic!("expected ConfigError for {contents:?}, got {other:?}"),
        }
    }
}

#[test]
fn malformed_glob_is_pattern_error() {
    let file = write_config("[runner]\ncmd = [\"x\"]\n[watch]\nignore = [\"src/[oops\"]\n");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(DevsupError::PatternError(_))
    ));
}

#[test]
fn toml_syntax_error_is_reported() {
    let file = write_config("[runner\ncmd = ");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(DevsupError::TomlError(_))
    ));
}

#[test]
fn overrides_take_precedence() -> TestResult {
    let file = write_config("[runner]\ncmd = [\"node\", \"a.js\"]\n");
    let overrides = ConfigOverrides {
        command: vec!["node".into(), "b.js".into()],
        deps: Some(-1),
        clear: true,
    };

    let cfg = load_with_overrides(file.path(), &overrides)?;
    assert_eq!(cfg.runner.cmd, ["node", "b.js"]);
    assert_eq!(cfg.watch.deps, -1);
    assert!(cfg.runner.clear);
    Ok(())
}

#[test]
fn missing_file_needs_a_command() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Devsup.toml");

    assert!(matches!(
        load_with_overrides(&path, &ConfigOverrides::default()),
        Err(DevsupError::IoError(_))
    ));

    let overrides = ConfigOverrides {
        command: vec!["python".into(), "app.py".into()],
        ..Default::default()
    };
    let cfg = load_with_overrides(&path, &overrides)?;
    assert_eq!(cfg.runner.cmd, ["python", "app.py"]);
    Ok(())
}

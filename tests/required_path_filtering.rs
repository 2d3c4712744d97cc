// tests/required_path_filtering.rs

use std::path::PathBuf;

use devsup::control::ControlMessage;
use devsup::engine::{CoreCommand, SupervisorCore, SupervisorEvent};
use devsup::types::RunnerId;
use devsup_test_utils::builders::{CoreBuilder, change, project_path};
use devsup_test_utils::init_tracing;

fn booted(builder: CoreBuilder) -> SupervisorCore {
    let mut core = builder.build();
    core.boot();
    core.step(SupervisorEvent::RunnerSpawned { runner: RunnerId(1) });
    core
}

fn require(core: &mut SupervisorCore, path: PathBuf) -> Vec<CoreCommand> {
    core.step(SupervisorEvent::Control {
        runner: RunnerId(1),
        message: ControlMessage::RequiredPath { path },
    })
    .commands
}

#[test]
fn project_file_is_added_once() {
    init_tracing();
    let mut core = booted(CoreBuilder::new());
    let path = project_path("lib/db.js");

    assert_eq!(
        require(&mut core, path.clone()),
        vec![CoreCommand::AddWatchPath(path.clone())]
    );
    assert!(require(&mut core, path).is_empty());
}

#[test]
fn ignored_dependency_is_never_added() {
    init_tracing();
    let mut core = booted(CoreBuilder::new().ignore("**/*.json").ignore("vendor/**"));

    assert!(require(&mut core, project_path("data/fixtures.json")).is_empty());
    assert!(require(&mut core, project_path("vendor/lib.js")).is_empty());
}

#[test]
fn plugin_claimed_dependency_is_never_added() {
    init_tracing();
    let mut core = booted(CoreBuilder::new().plugin_ignore("**/*.css"));

    assert!(require(&mut core, project_path("styles/main.css")).is_empty());
}

#[test]
fn allow_list_does_not_filter_dependencies() {
    init_tracing();
    let mut core = booted(CoreBuilder::new().allow("src/**"));
    let path = project_path("lib/util.js");

    assert_eq!(
        require(&mut core, path.clone()),
        vec![CoreCommand::AddWatchPath(path.clone())]
    );

    // A change to the watched dependency restarts the runner.
    let step = core.step(SupervisorEvent::FileChanged(change("lib/util.js")));
    assert_eq!(
        step.commands,
        vec![
            CoreCommand::PauseWatch,
            CoreCommand::Compile(path),
            CoreCommand::Terminate(RunnerId(1)),
        ]
    );
}

#[test]
fn unreported_file_outside_allow_list_stays_irrelevant() {
    init_tracing();
    let mut core = booted(CoreBuilder::new().allow("src/**"));
    require(&mut core, project_path("lib/util.js"));

    let step = core.step(SupervisorEvent::FileChanged(change("lib/other.js")));
    assert!(step.commands.is_empty());
    assert!(!core.is_restarting());
}

#[test]
fn forgotten_dependency_is_added_again() {
    init_tracing();
    let mut core = booted(CoreBuilder::new());
    let path = project_path("lib/db.js");

    require(&mut core, path.clone());
    core.forget_required(&path);
    assert_eq!(require(&mut core, path.clone()), vec![CoreCommand::AddWatchPath(path)]);
}

#[test]
fn dependency_depth_bound_is_enforced() {
    init_tracing();

    // Default depth 0: nothing inside node_modules.
    let mut core = booted(CoreBuilder::new());
    assert!(require(&mut core, project_path("node_modules/left-pad/index.js")).is_empty());

    let mut core = booted(CoreBuilder::new().deps(1));
    let direct = project_path("node_modules/express/index.js");
    assert_eq!(
        require(&mut core, direct.clone()),
        vec![CoreCommand::AddWatchPath(direct)]
    );
    assert!(
        require(
            &mut core,
            project_path("node_modules/express/node_modules/qs/index.js")
        )
        .is_empty()
    );

    // -1 is unlimited.
    let mut core = booted(CoreBuilder::new().deps(-1));
    let deep = project_path("node_modules/a/node_modules/b/node_modules/c/index.js");
    assert_eq!(require(&mut core, deep.clone()), vec![CoreCommand::AddWatchPath(deep)]);
}

#[test]
fn paths_outside_root_are_matched_whole() {
    init_tracing();
    let mut core = booted(CoreBuilder::new().ignore("/usr/**"));

    assert!(require(&mut core, PathBuf::from("/usr/lib/node/fs.js")).is_empty());
    let shared = PathBuf::from("/opt/shared/config.js");
    assert_eq!(require(&mut core, shared.clone()), vec![CoreCommand::AddWatchPath(shared)]);
}

#[test]
fn required_path_from_superseded_runner_is_ignored() {
    init_tracing();
    let mut core = booted(CoreBuilder::new());

    let step = core.step(SupervisorEvent::Control {
        runner: RunnerId(7),
        message: ControlMessage::RequiredPath {
            path: project_path("lib/db.js"),
        },
    });
    assert!(step.commands.is_empty());
}

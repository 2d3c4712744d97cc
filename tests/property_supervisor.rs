// tests/property_supervisor.rs

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use devsup::control::ControlMessage;
use devsup::engine::{CoreCommand, SupervisorEvent};
use devsup::types::RunnerId;
use devsup_test_utils::builders::{CoreBuilder, change};

/// What the outside world does next.
#[derive(Debug, Clone)]
enum Op {
    Change(usize),
    /// A change queued just ahead of the pending spawn's completion.
    ChangeThenSpawnDone(usize),
    /// The pending spawn completes.
    SpawnDone,
    /// The live runner goes away, on request or by itself.
    Exit(Option<i32>),
    Ready,
    Error(bool),
    Shutdown,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..4usize).prop_map(Op::Change),
        2 => (0..4usize).prop_map(Op::ChangeThenSpawnDone),
        3 => Just(Op::SpawnDone),
        3 => proptest::option::of(0..3i32).prop_map(Op::Exit),
        2 => Just(Op::Ready),
        1 => any::<bool>().prop_map(Op::Error),
        1 => Just(Op::Shutdown),
    ]
}

const FILES: [&str; 4] = ["src/a.js", "src/b.js", "lib/c.js", "index.js"];

/// Simulated OS: which runners exist and what has been asked of them.
#[derive(Default)]
struct World {
    live: BTreeSet<u64>,
    pending_spawn: Option<u64>,
    terminated: HashMap<u64, usize>,
    /// Runners that announced they are exiting on their own.
    self_stopping: BTreeSet<u64>,
    last_spawn: u64,
    /// A relevant change stopped the live runner; its exit must respawn.
    owes_respawn: bool,
    shutdown: bool,
}

impl World {
    fn apply(&mut self, commands: &[CoreCommand]) -> Result<(), TestCaseError> {
        for command in commands {
            match command {
                CoreCommand::Spawn(RunnerId(id)) => {
                    prop_assert!(
                        self.live.is_empty(),
                        "spawned #{} while {:?} still live",
                        id,
                        self.live
                    );
                    prop_assert!(*id > self.last_spawn, "runner ids must increase");
                    self.last_spawn = *id;
                    self.live.insert(*id);
                    self.pending_spawn = Some(*id);
                    self.owes_respawn = false;
                }
                CoreCommand::Terminate(RunnerId(id)) => {
                    let n = self.terminated.entry(*id).or_default();
                    *n += 1;
                    prop_assert!(*n == 1, "runner #{} signalled twice", id);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn live_runner_stopping(&self) -> bool {
        self.live
            .iter()
            .any(|id| self.terminated.contains_key(id) || self.self_stopping.contains(id))
    }

    /// Events for one op; empty when the op does not apply right now.
    fn events_for(&mut self, op: &Op) -> Vec<SupervisorEvent> {
        match *op {
            Op::Change(i) => vec![SupervisorEvent::FileChanged(change(FILES[i]))],
            Op::ChangeThenSpawnDone(i) => {
                let mut events = vec![SupervisorEvent::FileChanged(change(FILES[i]))];
                events.extend(self.spawn_done());
                events
            }
            Op::SpawnDone => self.spawn_done().into_iter().collect(),
            Op::Exit(code) => {
                let Some(&id) = self.live.iter().next() else { return Vec::new() };
                if self.pending_spawn == Some(id) {
                    return Vec::new();
                }
                self.live.remove(&id);
                let signalled = self.terminated.contains_key(&id);
                vec![SupervisorEvent::RunnerExited {
                    runner: RunnerId(id),
                    code: if signalled { None } else { code },
                }]
            }
            Op::Ready | Op::Error(_) => {
                let Some(&id) = self.live.iter().next() else { return Vec::new() };
                let message = match *op {
                    Op::Error(will_terminate) => {
                        if will_terminate && !self.shutdown {
                            self.self_stopping.insert(id);
                        }
                        ControlMessage::Error {
                            message: "boom".into(),
                            will_terminate,
                        }
                    }
                    _ => ControlMessage::Ready,
                };
                vec![SupervisorEvent::Control { runner: RunnerId(id), message }]
            }
            Op::Shutdown => {
                self.shutdown = true;
                self.owes_respawn = false;
                vec![SupervisorEvent::ShutdownRequested]
            }
        }
    }

    fn spawn_done(&mut self) -> Option<SupervisorEvent> {
        self.pending_spawn
            .take()
            .map(|id| SupervisorEvent::RunnerSpawned { runner: RunnerId(id) })
    }
}

proptest! {
    #[test]
    fn at_most_one_runner_and_one_signal_each(ops in proptest::collection::vec(op_strategy(), 1..60)) {
        let mut core = CoreBuilder::new().build();
        let mut world = World::default();
        world.apply(&core.boot().commands)?;

        'ops: for op in ops {
            for event in world.events_for(&op) {
                let is_change = matches!(event, SupervisorEvent::FileChanged(_));
                let is_exit = matches!(event, SupervisorEvent::RunnerExited { .. });
                let owed = world.owes_respawn;

                let step = core.step(event);
                world.apply(&step.commands)?;
                if !step.keep_running {
                    prop_assert!(core.is_finished());
                    break 'ops;
                }

                if is_exit && owed {
                    prop_assert!(
                        step.commands.iter().any(|c| matches!(c, CoreCommand::Spawn(_))),
                        "runner stopped for a change exited without a replacement: {:?}",
                        step.commands
                    );
                }
                if is_change && !world.shutdown && world.live_runner_stopping() {
                    world.owes_respawn = true;
                }
            }
        }
    }

    #[test]
    fn burst_of_changes_yields_one_stop(files in proptest::collection::vec(0..4usize, 1..30)) {
        let mut core = CoreBuilder::new().build();
        core.boot();
        core.step(SupervisorEvent::RunnerSpawned { runner: RunnerId(1) });

        let mut stops = 0;
        let mut pauses = 0;
        for i in files {
            for command in core.step(SupervisorEvent::FileChanged(change(FILES[i]))).commands {
                match command {
                    CoreCommand::Terminate(_) => stops += 1,
                    CoreCommand::PauseWatch => pauses += 1,
                    CoreCommand::Spawn(_) => prop_assert!(false, "spawned before the old runner exited"),
                    _ => {}
                }
            }
        }
        prop_assert_eq!(stops, 1);
        prop_assert_eq!(pauses, 1);

        let step = core.step(SupervisorEvent::RunnerExited { runner: RunnerId(1), code: None });
        prop_assert_eq!(step.commands, vec![CoreCommand::Spawn(RunnerId(2))]);
    }
}

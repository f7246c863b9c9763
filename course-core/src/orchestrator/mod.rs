//! Task orchestrator shared between firmware and host targets.
//!
//! The orchestrator watches the top and bottom distance channels while the
//! base is cruising, debounces target detections by counting ticks of forward
//! travel, and then claims the vehicle (vetoing base motion) to run one of the
//! fixed task scripts through the subsystem sequencers. Its only output to
//! the control loop is the motion veto; drive duty stays with the base.

use core::fmt;

use crate::config::{Checkpoints, CourseConfig, DebounceTicks, TaskThresholds};
use crate::sequences::{
    ActuatorPort, BlockingDelay, DELIVER_TEMPLATE, LAUNCH_TEMPLATE, LiftRequest, LiftStage,
    ScriptReport, ScriptTemplate, SequenceError, Sequencer, Sequencers, collect_template,
};

/// Phases of the task cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TaskState {
    AwaitFirstTarget,
    ApproachFirstTarget,
    ReadyToActOnFirst,
    ActOnFirst,
    AwaitSecondaryTarget,
    ApproachCup,
    ApproachNet,
    ReadyToDrop,
    Drop,
    ReadyToLaunch,
    Launch,
    CooldownAfterSecondary,
    AwaitEndMarker,
    CooldownAfterEndMarker,
}

/// Every task state, in declaration order.
pub const ALL_TASK_STATES: [TaskState; 14] = [
    TaskState::AwaitFirstTarget,
    TaskState::ApproachFirstTarget,
    TaskState::ReadyToActOnFirst,
    TaskState::ActOnFirst,
    TaskState::AwaitSecondaryTarget,
    TaskState::ApproachCup,
    TaskState::ApproachNet,
    TaskState::ReadyToDrop,
    TaskState::Drop,
    TaskState::ReadyToLaunch,
    TaskState::Launch,
    TaskState::CooldownAfterSecondary,
    TaskState::AwaitEndMarker,
    TaskState::CooldownAfterEndMarker,
];

impl TaskState {
    /// Whether the base may keep driving while in this state.
    #[must_use]
    pub const fn allows_base_motion(self) -> bool {
        match self {
            TaskState::ReadyToActOnFirst
            | TaskState::ActOnFirst
            | TaskState::ReadyToDrop
            | TaskState::Drop
            | TaskState::ReadyToLaunch
            | TaskState::Launch => false,
            TaskState::AwaitFirstTarget
            | TaskState::ApproachFirstTarget
            | TaskState::AwaitSecondaryTarget
            | TaskState::ApproachCup
            | TaskState::ApproachNet
            | TaskState::CooldownAfterSecondary
            | TaskState::AwaitEndMarker
            | TaskState::CooldownAfterEndMarker => true,
        }
    }

    /// `true` while forward travel is being counted toward a target.
    #[must_use]
    pub const fn is_approach(self) -> bool {
        matches!(
            self,
            TaskState::ApproachFirstTarget | TaskState::ApproachCup | TaskState::ApproachNet
        )
    }

    /// Short kebab-case name used in logs and the console.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TaskState::AwaitFirstTarget => "await-first-target",
            TaskState::ApproachFirstTarget => "approach-first-target",
            TaskState::ReadyToActOnFirst => "ready-to-act-on-first",
            TaskState::ActOnFirst => "act-on-first",
            TaskState::AwaitSecondaryTarget => "await-secondary-target",
            TaskState::ApproachCup => "approach-cup",
            TaskState::ApproachNet => "approach-net",
            TaskState::ReadyToDrop => "ready-to-drop",
            TaskState::Drop => "drop",
            TaskState::ReadyToLaunch => "ready-to-launch",
            TaskState::Launch => "launch",
            TaskState::CooldownAfterSecondary => "cooldown-after-secondary",
            TaskState::AwaitEndMarker => "await-end-marker",
            TaskState::CooldownAfterEndMarker => "cooldown-after-end-marker",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-tick orchestrator input.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TaskInput {
    pub top: f32,
    pub bottom: f32,
    pub cruising: bool,
}

/// Per-tick orchestrator output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TaskOutput {
    pub allow_base_motion: bool,
    /// Script completed during this tick, if any.
    pub script: Option<ScriptReport>,
}

/// Progress counters carried across the course.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TaskCounters {
    /// Ticks of forward travel since the current approach began.
    pub advance_ticks: u16,
    pub primary_targets_handled: u8,
    pub secondary_targets_handled: u8,
}

/// Failure while running a task script.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TaskError {
    pub state: TaskState,
    pub error: SequenceError,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.state, self.error)
    }
}

/// Task-sequencing state machine.
#[derive(Clone, Debug)]
pub struct TaskOrchestrator {
    state: TaskState,
    counters: TaskCounters,
    thresholds: TaskThresholds,
    debounce: DebounceTicks,
    secondary_cap: u8,
    checkpoints: Checkpoints,
    sequencers: Sequencers,
}

impl TaskOrchestrator {
    #[must_use]
    pub fn new(config: &CourseConfig) -> Self {
        Self {
            state: TaskState::AwaitFirstTarget,
            counters: TaskCounters::default(),
            thresholds: config.task,
            debounce: config.debounce,
            secondary_cap: config.secondary_target_cap,
            checkpoints: config.checkpoints.clone(),
            sequencers: Sequencers::new(config.timings),
        }
    }

    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    #[must_use]
    pub const fn counters(&self) -> TaskCounters {
        self.counters
    }

    #[must_use]
    pub const fn sequencers(&self) -> &Sequencers {
        &self.sequencers
    }

    /// Drives the lift down to its stowed height.
    pub fn stow_lift<A, D>(&mut self, actuators: &mut A, delay: &mut D) -> Result<(), TaskError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        self.sequencers
            .lift
            .run_to_idle(LiftRequest::Reset, actuators, delay)
            .map(|_| ())
            .map_err(|error| TaskError {
                state: self.state,
                error,
            })
    }

    /// Discards any in-flight approach progress.
    pub fn reset_advance_ticks(&mut self) {
        self.counters.advance_ticks = 0;
    }

    /// Advances one tick, running a task script to completion when the state calls for it.
    ///
    /// On error the state is left where it was so the caller can report it.
    pub fn transition<A, D>(
        &mut self,
        input: TaskInput,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<TaskOutput, TaskError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        let mut script = None;
        let next = match self.state {
            TaskState::AwaitFirstTarget => {
                if input.cruising && self.both_detected(input) {
                    self.counters.advance_ticks = 0;
                    TaskState::ApproachFirstTarget
                } else {
                    TaskState::AwaitFirstTarget
                }
            }
            TaskState::ApproachFirstTarget => {
                let required = if self.counters.primary_targets_handled == 0 {
                    self.debounce.first_target
                } else {
                    self.debounce.repeat_target
                };
                self.count_approach(required, TaskState::ReadyToActOnFirst)
            }
            TaskState::ReadyToActOnFirst => {
                self.counters.advance_ticks = 0;
                TaskState::ActOnFirst
            }
            TaskState::ActOnFirst => {
                let stage = if self.counters.secondary_targets_handled == 0 {
                    LiftStage::First
                } else {
                    LiftStage::Repeat
                };
                script = Some(self.run_script(collect_template(stage), actuators, delay)?);
                self.counters.primary_targets_handled =
                    self.counters.primary_targets_handled.saturating_add(1);
                TaskState::AwaitSecondaryTarget
            }
            TaskState::AwaitSecondaryTarget => self.classify_secondary(input),
            TaskState::ApproachCup => self.count_approach(self.debounce.cup, TaskState::ReadyToDrop),
            TaskState::ApproachNet => {
                self.count_approach(self.debounce.net, TaskState::ReadyToLaunch)
            }
            TaskState::ReadyToDrop => {
                self.counters.advance_ticks = 0;
                TaskState::Drop
            }
            TaskState::Drop => {
                script = Some(self.run_script(DELIVER_TEMPLATE, actuators, delay)?);
                TaskState::CooldownAfterSecondary
            }
            TaskState::ReadyToLaunch => {
                self.counters.advance_ticks = 0;
                TaskState::Launch
            }
            TaskState::Launch => {
                script = Some(self.run_script(LAUNCH_TEMPLATE, actuators, delay)?);
                TaskState::CooldownAfterSecondary
            }
            TaskState::CooldownAfterSecondary => {
                if input.bottom > self.thresholds.reject || !input.cruising {
                    let handled = self.counters.secondary_targets_handled;
                    if self.checkpoints.is_end_marker(handled) || handled >= self.secondary_cap {
                        TaskState::AwaitEndMarker
                    } else {
                        TaskState::AwaitSecondaryTarget
                    }
                } else {
                    TaskState::CooldownAfterSecondary
                }
            }
            TaskState::AwaitEndMarker => {
                if input.cruising && self.both_detected(input) {
                    TaskState::CooldownAfterEndMarker
                } else {
                    TaskState::AwaitEndMarker
                }
            }
            TaskState::CooldownAfterEndMarker => {
                let cleared =
                    input.bottom > self.thresholds.reject && input.top > self.thresholds.reject;
                if cleared || !input.cruising {
                    if self.counters.secondary_targets_handled == self.checkpoints.primary_rearm {
                        TaskState::AwaitFirstTarget
                    } else {
                        TaskState::AwaitSecondaryTarget
                    }
                } else {
                    TaskState::CooldownAfterEndMarker
                }
            }
        };

        self.state = next;
        Ok(TaskOutput {
            allow_base_motion: next.allows_base_motion(),
            script,
        })
    }

    fn both_detected(&self, input: TaskInput) -> bool {
        input.top < self.thresholds.top_detect && input.bottom < self.thresholds.bottom_detect
    }

    fn count_approach(&mut self, required: u16, ready: TaskState) -> TaskState {
        self.counters.advance_ticks = self.counters.advance_ticks.saturating_add(1);
        if self.counters.advance_ticks >= required {
            ready
        } else {
            self.state
        }
    }

    fn classify_secondary(&mut self, input: TaskInput) -> TaskState {
        let handled = self.counters.secondary_targets_handled;
        if !input.cruising
            || handled >= self.secondary_cap
            || input.bottom >= self.thresholds.bottom_detect
        {
            return TaskState::AwaitSecondaryTarget;
        }

        self.counters.secondary_targets_handled = handled + 1;
        self.counters.advance_ticks = 0;
        if handled == 0 {
            // The marker that triggered the first primary target reads as a secondary one.
            TaskState::CooldownAfterSecondary
        } else if input.top < self.thresholds.top_detect {
            TaskState::ApproachNet
        } else {
            TaskState::ApproachCup
        }
    }

    fn run_script<A, D>(
        &mut self,
        template: ScriptTemplate,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<ScriptReport, TaskError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        template
            .run(&mut self.sequencers, actuators, delay)
            .map_err(|error| TaskError {
                state: self.state,
                error,
            })
    }
}

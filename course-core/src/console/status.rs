//! Snapshot rendered by the `status` command.

use core::fmt;

use crate::base::BaseState;
use crate::control::{ControlLoop, CourseResult};
use crate::orchestrator::{TaskCounters, TaskState};
use crate::sensors::SensorPort;
use crate::sequences::{ActuatorPort, BlockingDelay};

/// Live course progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CourseStatus {
    pub tick: u32,
    pub base: BaseState,
    pub task: TaskState,
    pub counters: TaskCounters,
    /// Set once the course has ended.
    pub result: Option<CourseResult>,
}

impl CourseStatus {
    /// Samples `control`. `result` is whatever the host recorded when the course ended.
    #[must_use]
    pub fn capture<S, A, D>(control: &ControlLoop<S, A, D>, result: Option<CourseResult>) -> Self
    where
        S: SensorPort,
        A: ActuatorPort,
        D: BlockingDelay,
    {
        Self {
            tick: control.ticks(),
            base: control.base().state(),
            task: control.orchestrator().state(),
            counters: control.orchestrator().counters(),
            result,
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} base={} task={} primary={} secondary={} advance={}",
            self.tick,
            self.base,
            self.task,
            self.counters.primary_targets_handled,
            self.counters.secondary_targets_handled,
            self.counters.advance_ticks,
        )?;
        if let Some(result) = self.result {
            write!(f, " result={result}")?;
        }
        Ok(())
    }
}

//! Shared status storage for the firmware target.
//!
//! The course task publishes its progress through lightweight atomics so the
//! start button task can tell whether a press means "start" or "stop", and so
//! a finished run can be summarised without holding on to the control loop.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use course_core::base::{ALL_BASE_STATES, BaseState};
use course_core::control::{CourseResult, TickSummary};
use course_core::orchestrator::{ALL_TASK_STATES, TaskCounters, TaskState};
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

const NO_RESULT: u8 = 0;
const FINISHED: u8 = 1;
const ABORTED: u8 = 2;

static RUNNING: AtomicBool = AtomicBool::new(false);
static TICK: AtomicU32 = AtomicU32::new(0);
/// Index into `ALL_BASE_STATES`.
static BASE: AtomicU8 = AtomicU8::new(0);
/// Index into `ALL_TASK_STATES`.
static TASK: AtomicU8 = AtomicU8::new(0);
static PRIMARY_HANDLED: AtomicU8 = AtomicU8::new(0);
static SECONDARY_HANDLED: AtomicU8 = AtomicU8::new(0);
static RESULT: AtomicU8 = AtomicU8::new(NO_RESULT);

/// How the last course ended, without the abort detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Aborted,
}

/// Progress as last published by the course task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub running: bool,
    pub tick: u32,
    pub base: BaseState,
    pub task: TaskState,
    pub primary_handled: u8,
    pub secondary_handled: u8,
    pub outcome: Option<Outcome>,
}

fn index_of<T: PartialEq>(all: &[T], item: &T) -> u8 {
    let index = all.iter().position(|candidate| candidate == item).unwrap_or(0);
    u8::try_from(index).unwrap_or(0)
}

/// Clears the previous run and marks a course as in progress.
pub fn begin_course() {
    TICK.store(0, Ordering::Relaxed);
    BASE.store(0, Ordering::Relaxed);
    TASK.store(0, Ordering::Relaxed);
    PRIMARY_HANDLED.store(0, Ordering::Relaxed);
    SECONDARY_HANDLED.store(0, Ordering::Relaxed);
    RESULT.store(NO_RESULT, Ordering::Relaxed);
    RUNNING.store(true, Ordering::Release);
}

/// Publishes the state reached by one tick.
pub fn record_tick(summary: &TickSummary, counters: TaskCounters) {
    TICK.store(summary.tick, Ordering::Relaxed);
    BASE.store(index_of(&ALL_BASE_STATES, &summary.base), Ordering::Relaxed);
    TASK.store(index_of(&ALL_TASK_STATES, &summary.task), Ordering::Relaxed);
    PRIMARY_HANDLED.store(counters.primary_targets_handled, Ordering::Relaxed);
    SECONDARY_HANDLED.store(counters.secondary_targets_handled, Ordering::Relaxed);
}

/// Marks the course as over.
pub fn record_result(result: &CourseResult) {
    let code = match result {
        CourseResult::Finished => FINISHED,
        CourseResult::Aborted(_) => ABORTED,
    };
    RESULT.store(code, Ordering::Relaxed);
    RUNNING.store(false, Ordering::Release);
}

pub fn is_running() -> bool {
    RUNNING.load(Ordering::Acquire)
}

/// Builds a [`StatusSnapshot`] from the stored values.
pub fn snapshot() -> StatusSnapshot {
    let base = ALL_BASE_STATES
        .get(usize::from(BASE.load(Ordering::Relaxed)))
        .copied()
        .unwrap_or(BaseState::Start);
    let task = ALL_TASK_STATES
        .get(usize::from(TASK.load(Ordering::Relaxed)))
        .copied()
        .unwrap_or(TaskState::AwaitFirstTarget);
    let outcome = match RESULT.load(Ordering::Relaxed) {
        FINISHED => Some(Outcome::Finished),
        ABORTED => Some(Outcome::Aborted),
        _ => None,
    };

    StatusSnapshot {
        running: is_running(),
        tick: TICK.load(Ordering::Relaxed),
        base,
        task,
        primary_handled: PRIMARY_HANDLED.load(Ordering::Relaxed),
        secondary_handled: SECONDARY_HANDLED.load(Ordering::Relaxed),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::control::AbortReason;
    use course_core::drive::DriveCommand;

    #[test]
    fn snapshot_reflects_the_last_published_tick() {
        begin_course();
        assert!(is_running());
        assert_eq!(snapshot().outcome, None);

        let summary = TickSummary {
            tick: 42,
            base: BaseState::VeerLeft,
            task: TaskState::ApproachCup,
            drive: DriveCommand::stopped(),
            script: None,
        };
        let counters = TaskCounters {
            advance_ticks: 7,
            primary_targets_handled: 1,
            secondary_targets_handled: 2,
        };
        record_tick(&summary, counters);

        let status = snapshot();
        assert_eq!(status.tick, 42);
        assert_eq!(status.base, BaseState::VeerLeft);
        assert_eq!(status.task, TaskState::ApproachCup);
        assert_eq!(status.secondary_handled, 2);

        record_result(&CourseResult::Aborted(AbortReason::StopRequested));
        let status = snapshot();
        assert!(!status.running);
        assert_eq!(status.outcome, Some(Outcome::Aborted));
    }
}

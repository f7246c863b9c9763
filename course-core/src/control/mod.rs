//! Fixed-period control loop tying sensors, state machines and actuators together.
//!
//! Each tick reads one [`SensorSnapshot`], steps the base, steps the
//! orchestrator with the cruising flag from the previous tick, and writes a
//! single drive command. Sequencer delays block inside the tick. Every fatal
//! path funnels through [`ControlLoop::run_course`] or [`ControlLoop::abort`],
//! which stop all actuators exactly once.

use core::fmt;
use core::time::Duration;

use crate::base::{BaseMotionFsm, BaseState};
use crate::config::{ConfigError, CourseConfig};
use crate::drive::DriveCommand;
use crate::orchestrator::{TaskError, TaskInput, TaskOrchestrator, TaskState};
use crate::sensors::{SensorFault, SensorPort, SensorSnapshot};
use crate::sequences::{ActuatorError, ActuatorPort, BlockingDelay, ScriptReport};
use crate::telemetry::{TelemetryEvent, TelemetryRecorder};

/// Paces the loop between ticks.
pub trait TickTimer {
    /// Waits until the next tick boundary.
    fn wait_next(&mut self, period: Duration);
}

/// What one tick did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickSummary {
    pub tick: u32,
    pub base: BaseState,
    pub task: TaskState,
    /// Command written to the drivetrain.
    pub drive: DriveCommand,
    pub script: Option<ScriptReport>,
}

/// Outcome of a successful tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickReport {
    Advanced(TickSummary),
    /// Sensors failed; the drive was stopped and no state machine moved.
    SensorFault(SensorFault),
    /// The base reached the finish box.
    Finished(TickSummary),
}

/// Fatal errors raised while a course is running.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CourseError {
    Actuator(ActuatorError),
    Task(TaskError),
    /// Sensors stayed faulty for the configured number of consecutive ticks.
    SensorRecovery {
        fault: SensorFault,
        consecutive: u16,
    },
    /// The loop was already shut down.
    Halted,
}

impl From<ActuatorError> for CourseError {
    fn from(error: ActuatorError) -> Self {
        Self::Actuator(error)
    }
}

impl From<TaskError> for CourseError {
    fn from(error: TaskError) -> Self {
        Self::Task(error)
    }
}

impl fmt::Display for CourseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseError::Actuator(error) => error.fmt(f),
            CourseError::Task(error) => error.fmt(f),
            CourseError::SensorRecovery { fault, consecutive } => {
                write!(f, "{fault} ({consecutive} ticks in a row)")
            }
            CourseError::Halted => f.write_str("control loop already shut down"),
        }
    }
}

/// Why a course ended early.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AbortReason {
    Fault(CourseError),
    /// The start/stop button was pressed mid-course.
    StopRequested,
    /// The course itself finished but stopping the actuators failed.
    Shutdown(ActuatorError),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Fault(error) => write!(f, "fault: {error}"),
            AbortReason::StopRequested => f.write_str("stop requested"),
            AbortReason::Shutdown(error) => write!(f, "shutdown failed: {error}"),
        }
    }
}

/// Final result of a course run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CourseResult {
    Finished,
    Aborted(AbortReason),
}

impl fmt::Display for CourseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseResult::Finished => f.write_str("finished"),
            CourseResult::Aborted(reason) => write!(f, "aborted ({reason})"),
        }
    }
}

/// Owns the state machines and the hardware ports for one course.
pub struct ControlLoop<S, A, D> {
    config: CourseConfig,
    base: BaseMotionFsm,
    orchestrator: TaskOrchestrator,
    sensors: S,
    actuators: A,
    delay: D,
    telemetry: TelemetryRecorder,
    previous_cruising: bool,
    consecutive_faults: u16,
    tick: u32,
    shut_down: bool,
}

impl<S, A, D> ControlLoop<S, A, D>
where
    S: SensorPort,
    A: ActuatorPort,
    D: BlockingDelay,
{
    /// Validates `config` and builds a loop parked in the start states.
    pub fn new(config: CourseConfig, sensors: S, actuators: A, delay: D) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            base: BaseMotionFsm::new(config.navigation),
            orchestrator: TaskOrchestrator::new(&config),
            config,
            sensors,
            actuators,
            delay,
            telemetry: TelemetryRecorder::new(),
            previous_cruising: false,
            consecutive_faults: 0,
            tick: 0,
            shut_down: false,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &CourseConfig {
        &self.config
    }

    #[must_use]
    pub const fn base(&self) -> &BaseMotionFsm {
        &self.base
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &TaskOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryRecorder {
        &mut self.telemetry
    }

    #[must_use]
    pub const fn sensors(&self) -> &S {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn actuators_mut(&mut self) -> &mut A {
        &mut self.actuators
    }

    /// Number of ticks started so far.
    #[must_use]
    pub const fn ticks(&self) -> u32 {
        self.tick
    }

    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Gives the ports back once the loop is no longer needed.
    pub fn into_parts(self) -> (S, A, D) {
        (self.sensors, self.actuators, self.delay)
    }

    /// Runs a single control tick.
    pub fn tick(&mut self) -> Result<TickReport, CourseError> {
        if self.shut_down {
            return Err(CourseError::Halted);
        }
        self.tick = self.tick.wrapping_add(1);

        let snapshot = match SensorSnapshot::read(&mut self.sensors) {
            Ok(snapshot) => {
                self.consecutive_faults = 0;
                snapshot
            }
            Err(fault) => return self.recover_from_fault(fault),
        };

        let base_before = self.base.state();
        let task_before = self.orchestrator.state();

        let command = self.base.transition(&snapshot);
        let task = self.orchestrator.transition(
            TaskInput {
                top: snapshot.top,
                bottom: snapshot.bottom,
                cruising: self.previous_cruising,
            },
            &mut self.actuators,
            &mut self.delay,
        )?;

        if command.cruising != self.previous_cruising {
            self.orchestrator.reset_advance_ticks();
        }
        self.previous_cruising = command.cruising;

        let drive = if task.allow_base_motion {
            command
        } else {
            command.with_zero_duty()
        };
        self.actuators.set_drive(&drive)?;

        let summary = TickSummary {
            tick: self.tick,
            base: self.base.state(),
            task: self.orchestrator.state(),
            drive,
            script: task.script,
        };
        self.record_changes(base_before, task_before, &summary);

        Ok(if summary.base.is_terminal() {
            TickReport::Finished(summary)
        } else {
            TickReport::Advanced(summary)
        })
    }

    /// Ticks until the course finishes or fails, then shuts down.
    pub fn run_course<T>(&mut self, timer: &mut T) -> CourseResult
    where
        T: TickTimer + ?Sized,
    {
        if let Some(result) = self.prepare_actuators() {
            return result;
        }
        loop {
            if let Some(result) = self.paced_tick(timer) {
                return result;
            }
        }
    }

    /// Same as [`ControlLoop::run_course`], but gives up after `max_ticks` ticks.
    ///
    /// `None` means the course is still under way; the loop is left running.
    pub fn run_course_for<T>(&mut self, timer: &mut T, max_ticks: u32) -> Option<CourseResult>
    where
        T: TickTimer + ?Sized,
    {
        if let Some(result) = self.prepare_actuators() {
            return Some(result);
        }
        (0..max_ticks).find_map(|_| self.paced_tick(timer))
    }

    /// Brings the actuators up and stows the lift before the first tick.
    ///
    /// Returns the abort result if either step fails. Hosts that pace ticks
    /// themselves call this once before ticking.
    pub fn prepare_actuators(&mut self) -> Option<CourseResult> {
        let prepared = self
            .actuators
            .reinitialize()
            .map_err(CourseError::from)
            .and_then(|()| {
                self.orchestrator
                    .stow_lift(&mut self.actuators, &mut self.delay)
                    .map_err(CourseError::from)
            });
        prepared
            .err()
            .map(|error| self.abort(AbortReason::Fault(error)))
    }

    fn paced_tick<T>(&mut self, timer: &mut T) -> Option<CourseResult>
    where
        T: TickTimer + ?Sized,
    {
        let outcome = self.tick();
        let result = self.settle(outcome);
        if result.is_none() {
            timer.wait_next(self.config.tick_period);
        }
        result
    }

    /// Runs up to `ticks` ticks back to back. Returns the result if the course ended.
    pub fn step(&mut self, ticks: u32) -> Option<CourseResult> {
        for _ in 0..ticks {
            let outcome = self.tick();
            if let Some(result) = self.settle(outcome) {
                return Some(result);
            }
        }
        None
    }

    fn settle(&mut self, outcome: Result<TickReport, CourseError>) -> Option<CourseResult> {
        match outcome {
            Ok(TickReport::Finished(_)) => Some(self.finish()),
            Ok(TickReport::Advanced(_) | TickReport::SensorFault(_)) => None,
            Err(error) => Some(self.abort(AbortReason::Fault(error))),
        }
    }

    /// Ends the course normally.
    pub fn finish(&mut self) -> CourseResult {
        match self.shutdown() {
            Ok(()) => {
                self.telemetry
                    .record(TelemetryEvent::CourseFinished, self.tick);
                CourseResult::Finished
            }
            Err(error) => self.abort(AbortReason::Shutdown(error)),
        }
    }

    /// Ends the course early for `reason`, stopping every actuator.
    pub fn abort(&mut self, reason: AbortReason) -> CourseResult {
        // After a failed `finish` the loop is already shut down and this is a no-op.
        if let Err(error) = self.shutdown() {
            self.telemetry
                .record(TelemetryEvent::ShutdownFailed(error), self.tick);
        }
        self.telemetry
            .record(TelemetryEvent::CourseAborted(reason), self.tick);
        CourseResult::Aborted(reason)
    }

    /// Stops the drive and every subsystem. Only the first call does anything.
    ///
    /// Every stop is attempted; the first failure is returned.
    pub fn shutdown(&mut self) -> Result<(), ActuatorError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let results = [
            self.actuators.stop_drive(),
            self.actuators.stop_grabber(),
            self.actuators.stop_launcher(),
            self.actuators.stop_lift(),
        ];
        results.into_iter().collect()
    }

    fn recover_from_fault(&mut self, fault: SensorFault) -> Result<TickReport, CourseError> {
        self.actuators.stop_drive()?;
        self.telemetry
            .record(TelemetryEvent::SensorFault(fault), self.tick);
        self.consecutive_faults = self.consecutive_faults.saturating_add(1);

        let fault = match self.sensors.reinitialize() {
            Ok(()) => fault,
            Err(reinit) => reinit,
        };

        let limit = self.config.max_consecutive_sensor_faults;
        if limit > 0 && self.consecutive_faults >= limit {
            return Err(CourseError::SensorRecovery {
                fault,
                consecutive: self.consecutive_faults,
            });
        }
        Ok(TickReport::SensorFault(fault))
    }

    fn record_changes(&mut self, base_before: BaseState, task_before: TaskState, summary: &TickSummary) {
        if summary.base != base_before {
            self.telemetry.record(
                TelemetryEvent::BaseTransition {
                    from: base_before,
                    to: summary.base,
                },
                summary.tick,
            );
        }
        if summary.task != task_before {
            self.telemetry.record(
                TelemetryEvent::TaskTransition {
                    from: task_before,
                    to: summary.task,
                },
                summary.tick,
            );
        }
        if let Some(report) = summary.script {
            self.telemetry
                .record(TelemetryEvent::ScriptCompleted(report), summary.tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{LinePosition, SensorChannel};
    use crate::sequences::NoopDelay;
    use crate::sequences::testing::{Call, Recorder};

    struct FixedSensors {
        snapshot: SensorSnapshot,
        fail: Option<SensorFault>,
        reinit_fails: bool,
        reinitialized: usize,
    }

    impl FixedSensors {
        fn open() -> Self {
            Self {
                snapshot: SensorSnapshot {
                    front_left: 100.0,
                    front_middle: 100.0,
                    front_right: 100.0,
                    bottom: 100.0,
                    top: 100.0,
                    line: LinePosition::new(10.0, 10.0),
                },
                fail: None,
                reinit_fails: false,
                reinitialized: 0,
            }
        }
    }

    impl SensorPort for FixedSensors {
        fn read_distance(&mut self, channel: SensorChannel) -> Result<f32, SensorFault> {
            match self.fail {
                Some(fault) => Err(fault),
                None => Ok(self.snapshot.distance(channel)),
            }
        }

        fn read_line_position(&mut self) -> Result<LinePosition, SensorFault> {
            Ok(self.snapshot.line)
        }

        fn reinitialize(&mut self) -> Result<(), SensorFault> {
            self.reinitialized += 1;
            if self.reinit_fails {
                Err(SensorFault::Reinitialize)
            } else {
                Ok(())
            }
        }
    }

    fn control(sensors: FixedSensors) -> ControlLoop<FixedSensors, Recorder, NoopDelay> {
        ControlLoop::new(
            CourseConfig::competition(),
            sensors,
            Recorder::default(),
            NoopDelay,
        )
        .expect("competition config is valid")
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = CourseConfig::competition();
        config.tick_period = Duration::ZERO;
        let result = ControlLoop::new(config, FixedSensors::open(), Recorder::default(), NoopDelay);
        assert!(matches!(result, Err(ConfigError::ZeroTickPeriod)));
    }

    #[test]
    fn fault_stops_drive_and_reinitializes() {
        let mut sensors = FixedSensors::open();
        sensors.fail = Some(SensorFault::Distance(SensorChannel::Top));
        let mut control = control(sensors);

        let report = control.tick().expect("fault is recoverable");
        assert_eq!(
            report,
            TickReport::SensorFault(SensorFault::Distance(SensorChannel::Top))
        );
        assert_eq!(control.actuators_mut().calls.as_slice(), &[Call::StopDrive]);
        assert_eq!(control.sensors_mut().reinitialized, 1);
        assert_eq!(control.base().state(), BaseState::Start);
    }

    #[test]
    fn fault_limit_turns_recovery_failure_fatal() {
        let mut sensors = FixedSensors::open();
        sensors.fail = Some(SensorFault::LineArray);
        sensors.reinit_fails = true;
        let mut config = CourseConfig::competition();
        config.max_consecutive_sensor_faults = 2;
        let mut control =
            ControlLoop::new(config, sensors, Recorder::default(), NoopDelay).expect("valid");

        assert!(control.tick().is_ok());
        let error = control.tick().expect_err("second fault hits the limit");
        assert_eq!(
            error,
            CourseError::SensorRecovery {
                fault: SensorFault::Reinitialize,
                consecutive: 2,
            }
        );
    }

    #[test]
    fn shutdown_attempts_every_stop_once() {
        let mut control = control(FixedSensors::open());
        control.actuators_mut().fail_on = Some(Call::StopGrabber);

        assert_eq!(control.shutdown(), Err(ActuatorError::Grabber));
        assert_eq!(control.shutdown(), Ok(()));
        assert_eq!(
            control.actuators_mut().calls.as_slice(),
            &[Call::StopDrive, Call::StopLauncher, Call::StopLift]
        );
        assert_eq!(control.tick(), Err(CourseError::Halted));
    }

    #[test]
    fn stop_request_aborts_with_shutdown() {
        let mut control = control(FixedSensors::open());
        let result = control.abort(AbortReason::StopRequested);
        assert_eq!(result, CourseResult::Aborted(AbortReason::StopRequested));
        assert!(control.is_shut_down());
        assert!(
            control
                .telemetry()
                .latest()
                .is_some_and(|record| record.event.is_terminal())
        );
    }
}

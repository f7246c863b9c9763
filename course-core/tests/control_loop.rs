mod common;

use std::time::Duration;

use common::{Call, build_loop, drive_to_cruise, open_road, tick};
use course_core::base::BaseState;
use course_core::config::CourseConfig;
use course_core::control::{
    AbortReason, CourseError, CourseResult, TickReport, TickTimer,
};
use course_core::drive::{Direction, DriveCommand, DutyLevel};
use course_core::orchestrator::{TaskError, TaskState};
use course_core::sensors::{LinePosition, SensorChannel, SensorFault, SensorSnapshot};
use course_core::sequences::{ActuatorError, LiftStage, SequenceError};
use course_core::telemetry::TelemetryEvent;

#[derive(Default)]
struct CountingTimer {
    waits: usize,
    last_period: Option<Duration>,
}

impl TickTimer for CountingTimer {
    fn wait_next(&mut self, period: Duration) {
        self.waits += 1;
        self.last_period = Some(period);
    }
}

fn targets_overhead() -> SensorSnapshot {
    SensorSnapshot {
        top: 10.0,
        bottom: 10.0,
        ..open_road()
    }
}

fn finish_box() -> SensorSnapshot {
    SensorSnapshot {
        front_left: 10.0,
        front_middle: 4.0,
        front_right: 10.0,
        ..open_road()
    }
}

const FULL_AHEAD: DriveCommand = DriveCommand::new(
    DutyLevel::High,
    Direction::Forward,
    DutyLevel::High,
    Direction::Forward,
    true,
);

#[test]
fn open_road_keeps_cruising_symmetrically() {
    let mut control = build_loop(CourseConfig::competition());
    drive_to_cruise(&mut control);

    for _ in 0..10 {
        match tick(&mut control) {
            TickReport::Advanced(summary) => {
                assert_eq!(summary.base, BaseState::Cruise);
                assert_eq!(summary.drive, FULL_AHEAD);
            }
            other => panic!("unexpected report: {other:?}"),
        }
    }
}

#[test]
fn right_heavy_line_reduces_right_duty() {
    let mut control = build_loop(CourseConfig::competition());
    control.sensors_mut().push(SensorSnapshot {
        front_middle: 30.0,
        line: LinePosition::new(0.0, 5.0),
        ..open_road()
    });

    let TickReport::Advanced(summary) = tick(&mut control) else {
        panic!("expected an advanced tick");
    };
    assert_eq!(summary.base, BaseState::VeerRight);
    assert_eq!(summary.drive.right_duty, DutyLevel::Low);
    assert_eq!(summary.drive.left_duty, DutyLevel::High);
}

#[test]
fn finish_box_stops_the_course_and_shuts_down_once() {
    let mut control = build_loop(CourseConfig::competition());
    let sensors = control.sensors_mut();
    sensors.push(SensorSnapshot {
        front_middle: 30.0,
        line: LinePosition::new(0.0, 5.0),
        ..open_road()
    });
    sensors.push(open_road());
    sensors.hold(finish_box());

    let mut timer = CountingTimer::default();
    let result = control.run_course(&mut timer);

    assert_eq!(result, CourseResult::Finished);
    assert_eq!(control.base().state(), BaseState::Finish);
    assert_eq!(timer.waits, 2);
    assert_eq!(timer.last_period, Some(control.config().tick_period));

    let hw = control.actuators_mut();
    assert_eq!(&hw.calls[..2], &[Call::Reinitialize, Call::ResetLift]);
    assert_eq!(hw.count(Call::ResetLift), 1);
    assert_eq!(hw.last_drive(), Some(DriveCommand::stopped()));
    for stop in [
        Call::StopDrive,
        Call::StopGrabber,
        Call::StopLauncher,
        Call::StopLift,
    ] {
        assert_eq!(hw.count(stop), 1, "{stop:?}");
    }

    let transitions: Vec<(BaseState, BaseState)> = control
        .telemetry()
        .oldest_first()
        .filter_map(|record| match record.event {
            TelemetryEvent::BaseTransition { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (BaseState::Start, BaseState::VeerRight),
            (BaseState::VeerRight, BaseState::Cruise),
            (BaseState::Cruise, BaseState::Finish),
        ]
    );
    assert_eq!(
        control.telemetry().latest().map(|record| record.event),
        Some(TelemetryEvent::CourseFinished)
    );
}

#[test]
fn finish_is_absorbing_for_further_ticks() {
    let mut control = build_loop(CourseConfig::competition());
    drive_to_cruise(&mut control);
    control.sensors_mut().hold(finish_box());
    assert!(matches!(tick(&mut control), TickReport::Finished(_)));

    control.sensors_mut().hold(open_road());
    for _ in 0..3 {
        let TickReport::Finished(summary) = tick(&mut control) else {
            panic!("finish must stay terminal");
        };
        assert_eq!(summary.drive, DriveCommand::stopped());
    }
}

#[test]
fn sustained_target_runs_the_grab_with_the_base_stopped() {
    let config = CourseConfig::competition();
    let required = config.debounce.first_target;
    let mut control = build_loop(config);
    drive_to_cruise(&mut control);
    control.sensors_mut().hold(targets_overhead());

    tick(&mut control);
    assert_eq!(control.orchestrator().state(), TaskState::ApproachFirstTarget);
    for _ in 1..required {
        tick(&mut control);
        assert_eq!(control.orchestrator().state(), TaskState::ApproachFirstTarget);
        assert_eq!(control.actuators_mut().last_drive(), Some(FULL_AHEAD));
    }

    tick(&mut control);
    assert_eq!(control.orchestrator().state(), TaskState::ReadyToActOnFirst);
    assert_eq!(
        control.actuators_mut().last_drive(),
        Some(FULL_AHEAD.with_zero_duty())
    );

    tick(&mut control);
    assert_eq!(control.orchestrator().state(), TaskState::ActOnFirst);
    assert!(control.actuators_mut().subsystem_calls().is_empty());
    assert!(control.actuators_mut().last_drive().is_some_and(|drive| drive.is_stationary()));

    let TickReport::Advanced(summary) = tick(&mut control) else {
        panic!("grab tick should advance");
    };
    assert_eq!(summary.task, TaskState::AwaitSecondaryTarget);
    assert!(summary.script.is_some());
    assert_eq!(summary.drive, FULL_AHEAD);
    assert_eq!(
        control.actuators_mut().subsystem_calls(),
        vec![
            Call::RaiseLift(LiftStage::First),
            Call::Grab,
            Call::IncrementLift,
            Call::Retract,
            Call::ClearLift,
            Call::LowerLift,
        ]
    );
}

#[test]
fn sensor_fault_zeroes_drive_without_moving_any_state() {
    let mut control = build_loop(CourseConfig::competition());
    drive_to_cruise(&mut control);
    control.sensors_mut().hold(targets_overhead());
    tick(&mut control);
    tick(&mut control);
    tick(&mut control);
    let counters = control.orchestrator().counters();
    assert_eq!(counters.advance_ticks, 2);

    control.actuators_mut().calls.clear();
    let fault = SensorFault::Distance(SensorChannel::Bottom);
    control.sensors_mut().push_fault(fault);

    assert_eq!(tick(&mut control), TickReport::SensorFault(fault));
    assert_eq!(control.actuators_mut().calls, vec![Call::StopDrive]);
    assert_eq!(control.sensors_mut().reinitialized, 1);
    assert_eq!(control.base().state(), BaseState::Cruise);
    assert_eq!(control.orchestrator().state(), TaskState::ApproachFirstTarget);
    assert_eq!(control.orchestrator().counters(), counters);

    tick(&mut control);
    assert_eq!(control.orchestrator().counters().advance_ticks, 3);
    assert_eq!(control.actuators_mut().last_drive(), Some(FULL_AHEAD));
    assert!(
        control
            .telemetry()
            .oldest_first()
            .any(|record| record.event == TelemetryEvent::SensorFault(fault))
    );
}

#[test]
fn cruise_flip_resets_the_approach_counter() {
    let mut control = build_loop(CourseConfig::competition());
    drive_to_cruise(&mut control);
    control.sensors_mut().hold(targets_overhead());
    for _ in 0..4 {
        tick(&mut control);
    }
    assert_eq!(control.orchestrator().counters().advance_ticks, 3);

    control.sensors_mut().push(SensorSnapshot {
        front_middle: 9.0,
        ..targets_overhead()
    });
    tick(&mut control);
    assert_eq!(control.base().state(), BaseState::TurnLeft);
    assert_eq!(control.orchestrator().counters().advance_ticks, 0);

    tick(&mut control);
    assert_eq!(control.base().state(), BaseState::Cruise);
    assert_eq!(control.orchestrator().counters().advance_ticks, 0);

    tick(&mut control);
    assert_eq!(control.orchestrator().counters().advance_ticks, 1);
}

#[test]
fn script_failure_aborts_after_stopping_everything() {
    let mut config = CourseConfig::competition();
    config.debounce.first_target = 1;
    let mut control = build_loop(config);
    control.actuators_mut().fail_on = Some(|call| matches!(call, Call::Grab));
    let sensors = control.sensors_mut();
    sensors.push(SensorSnapshot {
        front_middle: 30.0,
        line: LinePosition::new(0.0, 5.0),
        ..open_road()
    });
    sensors.push(open_road());
    sensors.hold(targets_overhead());

    let result = control.run_course(&mut CountingTimer::default());

    let expected = AbortReason::Fault(CourseError::Task(TaskError {
        state: TaskState::ActOnFirst,
        error: SequenceError::Actuator(ActuatorError::Grabber),
    }));
    assert_eq!(result, CourseResult::Aborted(expected));
    assert!(control.is_shut_down());

    let hw = control.actuators_mut();
    assert_eq!(hw.count(Call::StopDrive), 1);
    assert_eq!(hw.count(Call::StopLift), 1);
    assert_eq!(
        control.telemetry().latest().map(|record| record.event),
        Some(TelemetryEvent::CourseAborted(expected))
    );
}

#[test]
fn failed_stop_during_abort_is_recorded() {
    let mut config = CourseConfig::competition();
    config.debounce.first_target = 1;
    let mut control = build_loop(config);
    control.actuators_mut().fail_on = Some(|call| matches!(call, Call::Grab | Call::StopLift));
    let sensors = control.sensors_mut();
    sensors.push(SensorSnapshot {
        front_middle: 30.0,
        line: LinePosition::new(0.0, 5.0),
        ..open_road()
    });
    sensors.push(open_road());
    sensors.hold(targets_overhead());

    let result = control.run_course(&mut CountingTimer::default());
    assert!(matches!(
        result,
        CourseResult::Aborted(AbortReason::Fault(CourseError::Task(_)))
    ));

    // Every other subsystem was still told to stop.
    assert_eq!(control.actuators_mut().count(Call::StopLauncher), 1);
    let events: Vec<TelemetryEvent> = control
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .collect();
    let failed = events
        .iter()
        .position(|event| *event == TelemetryEvent::ShutdownFailed(ActuatorError::Lift))
        .expect("failed stop is recorded");
    assert!(matches!(
        events.get(failed + 1),
        Some(TelemetryEvent::CourseAborted(AbortReason::Fault(_)))
    ));
}

#[test]
fn failed_stop_after_finish_is_reported_as_abort() {
    let mut control = build_loop(CourseConfig::competition());
    drive_to_cruise(&mut control);
    control.sensors_mut().hold(finish_box());
    control.actuators_mut().fail_on = Some(|call| matches!(call, Call::StopLift));

    let result = control.run_course(&mut CountingTimer::default());
    assert_eq!(
        result,
        CourseResult::Aborted(AbortReason::Shutdown(ActuatorError::Lift))
    );
    assert_eq!(control.actuators_mut().count(Call::StopLauncher), 1);
}

#[test]
fn lift_that_cannot_stow_aborts_before_the_first_tick() {
    let mut control = build_loop(CourseConfig::competition());
    control.actuators_mut().fail_on = Some(|call| matches!(call, Call::ResetLift));

    let mut timer = CountingTimer::default();
    let result = control.run_course(&mut timer);

    assert_eq!(
        result,
        CourseResult::Aborted(AbortReason::Fault(CourseError::Task(TaskError {
            state: TaskState::AwaitFirstTarget,
            error: SequenceError::Actuator(ActuatorError::Lift),
        })))
    );
    assert_eq!(control.ticks(), 0);
    assert_eq!(timer.waits, 0);
    assert!(control.is_shut_down());
    assert_eq!(control.actuators_mut().count(Call::StopLift), 1);
}

#[test]
fn bounded_run_leaves_an_unfinished_course_running() {
    let mut control = build_loop(CourseConfig::competition());
    control.sensors_mut().hold(open_road());
    let mut timer = CountingTimer::default();

    assert_eq!(control.run_course_for(&mut timer, 20), None);
    assert_eq!(control.ticks(), 20);
    assert_eq!(timer.waits, 20);
    assert!(!control.is_shut_down());
    assert_eq!(control.base().state(), BaseState::Start);

    drive_to_cruise(&mut control);
    control.sensors_mut().hold(finish_box());
    assert_eq!(
        control.run_course_for(&mut timer, 20),
        Some(CourseResult::Finished)
    );
    assert!(control.is_shut_down());
}

#[test]
fn stepping_stops_at_the_end_of_the_course() {
    let mut control = build_loop(CourseConfig::competition());
    assert_eq!(control.step(5), None);
    assert_eq!(control.ticks(), 5);
    assert_eq!(control.base().state(), BaseState::Start);

    drive_to_cruise(&mut control);
    control.sensors_mut().hold(finish_box());
    assert_eq!(control.step(10), Some(CourseResult::Finished));
    assert_eq!(control.ticks(), 8);
    assert_eq!(control.step(1), Some(CourseResult::Aborted(AbortReason::Fault(CourseError::Halted))));
}

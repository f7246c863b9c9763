#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use course_core::base::BaseState;
use course_core::config::CourseConfig;
use course_core::control::{ControlLoop, TickReport};
use course_core::drive::DriveCommand;
use course_core::sensors::{LinePosition, SensorChannel, SensorFault, SensorPort, SensorSnapshot};
use course_core::sequences::{ActuatorError, ActuatorPort, BlockingDelay, LiftStage};

pub type MockLoop = ControlLoop<MockSensors, MockActuators, MockDelay>;

/// Nothing nearby, line centred under the array.
pub fn open_road() -> SensorSnapshot {
    SensorSnapshot {
        front_left: 120.0,
        front_middle: 120.0,
        front_right: 120.0,
        bottom: 120.0,
        top: 120.0,
        line: LinePosition::new(10.0, 10.0),
    }
}

/// Sensors replaying one queued frame per tick, then repeating a fallback frame.
pub struct MockSensors {
    frames: VecDeque<Result<SensorSnapshot, SensorFault>>,
    current: Result<SensorSnapshot, SensorFault>,
    fallback: SensorSnapshot,
    pub reinitialized: usize,
}

impl MockSensors {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            current: Ok(open_road()),
            fallback: open_road(),
            reinitialized: 0,
        }
    }

    pub fn push(&mut self, snapshot: SensorSnapshot) {
        self.frames.push_back(Ok(snapshot));
    }

    pub fn push_many(&mut self, snapshot: SensorSnapshot, count: usize) {
        for _ in 0..count {
            self.push(snapshot);
        }
    }

    pub fn push_fault(&mut self, fault: SensorFault) {
        self.frames.push_back(Err(fault));
    }

    /// Replaces the frame repeated once the queue runs dry.
    pub fn hold(&mut self, snapshot: SensorSnapshot) {
        self.fallback = snapshot;
    }
}

impl SensorPort for MockSensors {
    fn read_distance(&mut self, channel: SensorChannel) -> Result<f32, SensorFault> {
        if channel == SensorChannel::FrontLeft {
            self.current = self.frames.pop_front().unwrap_or(Ok(self.fallback));
        }
        self.current.map(|snapshot| snapshot.distance(channel))
    }

    fn read_line_position(&mut self) -> Result<LinePosition, SensorFault> {
        self.current.map(|snapshot| snapshot.line)
    }

    fn reinitialize(&mut self) -> Result<(), SensorFault> {
        self.reinitialized += 1;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Call {
    SetDrive(DriveCommand),
    StopDrive,
    Grab,
    Retract,
    Extend,
    Dispense,
    StopGrabber,
    RunLauncher,
    StopLauncher,
    RaiseLift(LiftStage),
    IncrementLift,
    ClearLift,
    LowerLift,
    ResetLift,
    StopLift,
    Reinitialize,
}

/// Actuators that record every call and can be told to fail one kind of call.
#[derive(Default)]
pub struct MockActuators {
    pub calls: Vec<Call>,
    pub fail_on: Option<fn(&Call) -> bool>,
}

impl MockActuators {
    fn log(&mut self, call: Call, error: ActuatorError) -> Result<(), ActuatorError> {
        if self.fail_on.is_some_and(|matches| matches(&call)) {
            return Err(error);
        }
        self.calls.push(call);
        Ok(())
    }

    pub fn last_drive(&self) -> Option<DriveCommand> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::SetDrive(command) => Some(*command),
            _ => None,
        })
    }

    /// Calls other than drive updates, in order.
    pub fn subsystem_calls(&self) -> Vec<Call> {
        self.calls
            .iter()
            .copied()
            .filter(|call| !matches!(call, Call::SetDrive(_)))
            .collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|logged| **logged == call).count()
    }
}

impl ActuatorPort for MockActuators {
    fn set_drive(&mut self, command: &DriveCommand) -> Result<(), ActuatorError> {
        self.log(Call::SetDrive(*command), ActuatorError::Drive)
    }
    fn stop_drive(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::StopDrive, ActuatorError::Drive)
    }
    fn grab(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::Grab, ActuatorError::Grabber)
    }
    fn retract(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::Retract, ActuatorError::Grabber)
    }
    fn extend_to_target(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::Extend, ActuatorError::Grabber)
    }
    fn dispense(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::Dispense, ActuatorError::Grabber)
    }
    fn stop_grabber(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::StopGrabber, ActuatorError::Grabber)
    }
    fn run_launcher(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::RunLauncher, ActuatorError::Launcher)
    }
    fn stop_launcher(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::StopLauncher, ActuatorError::Launcher)
    }
    fn raise_lift(&mut self, stage: LiftStage) -> Result<(), ActuatorError> {
        self.log(Call::RaiseLift(stage), ActuatorError::Lift)
    }
    fn increment_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::IncrementLift, ActuatorError::Lift)
    }
    fn clear_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::ClearLift, ActuatorError::Lift)
    }
    fn lower_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::LowerLift, ActuatorError::Lift)
    }
    fn reset_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::ResetLift, ActuatorError::Lift)
    }
    fn stop_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::StopLift, ActuatorError::Lift)
    }
    fn reinitialize(&mut self) -> Result<(), ActuatorError> {
        self.log(Call::Reinitialize, ActuatorError::Reinitialize)
    }
}

/// Delay that sums every hold instead of sleeping.
#[derive(Default)]
pub struct MockDelay {
    pub total: Duration,
}

impl BlockingDelay for MockDelay {
    fn block_for(&mut self, duration: Duration) {
        self.total += duration;
    }
}

pub fn build_loop(config: CourseConfig) -> MockLoop {
    ControlLoop::new(
        config,
        MockSensors::new(),
        MockActuators::default(),
        MockDelay::default(),
    )
    .expect("test config should validate")
}

pub fn tick(control: &mut MockLoop) -> TickReport {
    control.tick().expect("tick should succeed")
}

/// Leaves the start box via a right veer and settles into cruise.
pub fn drive_to_cruise(control: &mut MockLoop) {
    let sensors = control.sensors_mut();
    sensors.push(SensorSnapshot {
        front_middle: 30.0,
        line: LinePosition::new(0.0, 5.0),
        ..open_road()
    });
    sensors.push(open_road());

    tick(control);
    tick(control);
    assert_eq!(control.base().state(), BaseState::Cruise);
    control.actuators_mut().calls.clear();
}

//! Scripted course used by the emulator.
//!
//! A [`Track`] is a list of segments, each one a sensor frame held for a
//! number of ticks. The simulated robot only moves along the track while the
//! last drive command had non-zero duty, so a vetoed base sits on the same
//! frame until the task script lets it go. Fault segments always advance; the
//! control loop stops the drive while it recovers and would otherwise never
//! leave them.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use course_core::control::TickTimer;
use course_core::drive::DriveCommand;
use course_core::sensors::{
    ALL_CHANNELS, LinePosition, RangeFilter, SensorChannel, SensorFault, SensorPort,
    SensorSnapshot,
};
use course_core::sequences::{ActuatorError, ActuatorPort, BlockingDelay, LiftStage};

/// Readings averaged by each simulated distance sensor.
pub const RANGE_WINDOW: usize = 3;

const FAR: f32 = 120.0;
const NEAR: f32 = 10.0;

/// What the sensors see while a segment lasts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Frame {
    Clear(SensorSnapshot),
    Fault(SensorFault),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub frame: Frame,
    pub ticks: u32,
}

impl Segment {
    pub const fn hold(snapshot: SensorSnapshot, ticks: u32) -> Self {
        Self {
            frame: Frame::Clear(snapshot),
            ticks,
        }
    }

    pub const fn fault(fault: SensorFault, ticks: u32) -> Self {
        Self {
            frame: Frame::Fault(fault),
            ticks,
        }
    }
}

/// Straight line, nothing in range.
pub const fn open_road() -> SensorSnapshot {
    SensorSnapshot {
        front_left: FAR,
        front_middle: FAR,
        front_right: FAR,
        bottom: FAR,
        top: FAR,
        line: LinePosition::new(10.0, 10.0),
    }
}

/// Wall ahead of the start box with the line off to the right.
pub const fn leave_start() -> SensorSnapshot {
    SensorSnapshot {
        front_middle: 30.0,
        line: LinePosition::new(0.0, 5.0),
        ..open_road()
    }
}

/// Primary target: both overhead sensors see it.
pub const fn tall_target() -> SensorSnapshot {
    SensorSnapshot {
        top: NEAR,
        bottom: NEAR,
        ..open_road()
    }
}

/// Cup or marker: only the bottom sensor sees it.
pub const fn low_target() -> SensorSnapshot {
    SensorSnapshot {
        bottom: NEAR,
        ..open_road()
    }
}

/// Wall ahead with open space on the left.
pub const fn left_corner() -> SensorSnapshot {
    SensorSnapshot {
        front_left: 80.0,
        front_middle: 9.0,
        front_right: 12.0,
        ..open_road()
    }
}

/// Finish box: walled in on three sides, centred on the line.
pub const fn finish_box() -> SensorSnapshot {
    SensorSnapshot {
        front_left: NEAR,
        front_middle: 4.0,
        front_right: NEAR,
        ..open_road()
    }
}

/// Ordered segments; the last one is held forever.
#[derive(Clone, Debug, Default)]
pub struct Track {
    segments: Vec<Segment>,
}

impl Track {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// One of each target kind between the start and finish boxes.
    pub fn competition() -> Self {
        Self::new(vec![
            Segment::hold(leave_start(), 2),
            Segment::hold(open_road(), 20),
            Segment::hold(tall_target(), 6),
            Segment::hold(open_road(), 30),
            // Marker under the first target; counted but skipped.
            Segment::hold(low_target(), 4),
            Segment::hold(open_road(), 20),
            Segment::hold(left_corner(), 4),
            Segment::hold(open_road(), 20),
            // Net.
            Segment::hold(tall_target(), 6),
            Segment::hold(open_road(), 30),
            // Cup.
            Segment::hold(low_target(), 6),
            Segment::hold(open_road(), 40),
            // End marker.
            Segment::hold(tall_target(), 6),
            Segment::hold(open_road(), 20),
            Segment::hold(finish_box(), 1),
        ])
    }

    /// The competition track with a burst of bottom sensor faults on the first straight.
    pub fn with_fault_burst(ticks: u32) -> Self {
        let mut track = Self::competition();
        track.segments.insert(
            2,
            Segment::fault(SensorFault::Distance(SensorChannel::Bottom), ticks),
        );
        track
    }
}

/// Where the simulated robot is along its track.
#[derive(Debug)]
struct Cursor {
    index: usize,
    remaining: u32,
}

/// Sensor port reading frames off a [`Track`].
pub struct SimSensors {
    track: Track,
    cursor: Cursor,
    current: Frame,
    moving: Rc<Cell<bool>>,
    filters: [RangeFilter<RANGE_WINDOW>; ALL_CHANNELS.len()],
    reinitializations: u32,
}

impl SimSensors {
    pub fn new(track: Track, moving: Rc<Cell<bool>>) -> Self {
        let remaining = track.segments.first().map_or(0, |segment| segment.ticks);
        Self {
            track,
            cursor: Cursor {
                index: 0,
                remaining,
            },
            current: Frame::Clear(open_road()),
            moving,
            filters: Default::default(),
            reinitializations: 0,
        }
    }

    pub const fn reinitializations(&self) -> u32 {
        self.reinitializations
    }

    /// Index of the segment under the robot.
    pub const fn position(&self) -> usize {
        self.cursor.index
    }

    /// `true` once the robot sits on the final, endlessly held segment.
    pub fn at_track_end(&self) -> bool {
        self.cursor.index + 1 >= self.track.segments.len()
    }

    fn sample(&mut self) {
        let Some(segment) = self.track.segments.get(self.cursor.index).copied() else {
            return;
        };
        self.current = segment.frame;

        let advances = matches!(segment.frame, Frame::Fault(_)) || self.moving.get();
        let last = self.cursor.index + 1 >= self.track.segments.len();
        if !advances || last {
            return;
        }
        self.cursor.remaining = self.cursor.remaining.saturating_sub(1);
        if self.cursor.remaining == 0 {
            self.cursor.index += 1;
            self.cursor.remaining = self
                .track
                .segments
                .get(self.cursor.index)
                .map_or(0, |next| next.ticks);
        }
    }
}

impl SensorPort for SimSensors {
    fn read_distance(&mut self, channel: SensorChannel) -> Result<f32, SensorFault> {
        // The first channel read opens a new tick.
        if channel == ALL_CHANNELS[0] {
            self.sample();
        }
        match self.current {
            Frame::Clear(snapshot) => {
                Ok(self.filters[channel.as_index()].push(snapshot.distance(channel)))
            }
            Frame::Fault(fault) => Err(fault),
        }
    }

    fn read_line_position(&mut self) -> Result<LinePosition, SensorFault> {
        match self.current {
            Frame::Clear(snapshot) => Ok(snapshot.line),
            Frame::Fault(fault) => Err(fault),
        }
    }

    fn reinitialize(&mut self) -> Result<(), SensorFault> {
        self.reinitializations += 1;
        for filter in &mut self.filters {
            filter.clear();
        }
        Ok(())
    }
}

/// Actuator call seen by the simulated hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardwareEvent {
    Drive(DriveCommand),
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

impl std::fmt::Display for HardwareEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HardwareEvent::Drive(command) => write!(
                f,
                "drive left={:?}/{:?} right={:?}/{:?}",
                command.left_duty, command.left_dir, command.right_duty, command.right_dir
            ),
            HardwareEvent::StopDrive => f.write_str("drive stop"),
            HardwareEvent::Grab => f.write_str("grabber grab"),
            HardwareEvent::Retract => f.write_str("grabber retract"),
            HardwareEvent::Extend => f.write_str("grabber extend"),
            HardwareEvent::Dispense => f.write_str("grabber dispense"),
            HardwareEvent::StopGrabber => f.write_str("grabber stop"),
            HardwareEvent::RunLauncher => f.write_str("launcher run"),
            HardwareEvent::StopLauncher => f.write_str("launcher stop"),
            HardwareEvent::RaiseLift(stage) => write!(f, "lift raise {stage}"),
            HardwareEvent::IncrementLift => f.write_str("lift increment"),
            HardwareEvent::ClearLift => f.write_str("lift clear"),
            HardwareEvent::LowerLift => f.write_str("lift lower"),
            HardwareEvent::ResetLift => f.write_str("lift reset"),
            HardwareEvent::StopLift => f.write_str("lift stop"),
            HardwareEvent::Reinitialize => f.write_str("reinitialize"),
        }
    }
}

/// Actuator port that journals calls and reports motion back to the sensors.
///
/// Drive updates are only journaled when the command changes.
pub struct SimActuators {
    moving: Rc<Cell<bool>>,
    last_drive: Option<DriveCommand>,
    journal: Vec<HardwareEvent>,
}

impl SimActuators {
    pub fn new(moving: Rc<Cell<bool>>) -> Self {
        Self {
            moving,
            last_drive: None,
            journal: Vec::new(),
        }
    }

    /// Takes every event journaled since the last drain.
    pub fn drain(&mut self) -> Vec<HardwareEvent> {
        std::mem::take(&mut self.journal)
    }

    fn log(&mut self, event: HardwareEvent) -> Result<(), ActuatorError> {
        self.journal.push(event);
        Ok(())
    }
}

impl ActuatorPort for SimActuators {
    fn set_drive(&mut self, command: &DriveCommand) -> Result<(), ActuatorError> {
        self.moving.set(!command.is_stationary());
        if self.last_drive == Some(*command) {
            return Ok(());
        }
        self.last_drive = Some(*command);
        self.log(HardwareEvent::Drive(*command))
    }

    fn stop_drive(&mut self) -> Result<(), ActuatorError> {
        self.moving.set(false);
        self.last_drive = None;
        self.log(HardwareEvent::StopDrive)
    }

    fn grab(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::Grab)
    }

    fn retract(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::Retract)
    }

    fn extend_to_target(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::Extend)
    }

    fn dispense(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::Dispense)
    }

    fn stop_grabber(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::StopGrabber)
    }

    fn run_launcher(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::RunLauncher)
    }

    fn stop_launcher(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::StopLauncher)
    }

    fn raise_lift(&mut self, stage: LiftStage) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::RaiseLift(stage))
    }

    fn increment_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::IncrementLift)
    }

    fn clear_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::ClearLift)
    }

    fn lower_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::LowerLift)
    }

    fn reset_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::ResetLift)
    }

    fn stop_lift(&mut self) -> Result<(), ActuatorError> {
        self.log(HardwareEvent::StopLift)
    }

    fn reinitialize(&mut self) -> Result<(), ActuatorError> {
        self.moving.set(true);
        self.last_drive = None;
        self.log(HardwareEvent::Reinitialize)
    }
}

/// Simulated time. Delays and tick waits advance it without sleeping.
#[derive(Clone, Debug, Default)]
pub struct SimClock {
    elapsed: Rc<Cell<Duration>>,
}

impl SimClock {
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    fn advance(&self, duration: Duration) {
        self.elapsed.set(self.elapsed.get() + duration);
    }
}

impl BlockingDelay for SimClock {
    fn block_for(&mut self, duration: Duration) {
        self.advance(duration);
    }
}

impl TickTimer for SimClock {
    fn wait_next(&mut self, period: Duration) {
        self.advance(period);
    }
}

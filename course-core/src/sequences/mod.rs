//! Open-loop actuator sequencers shared by firmware and host targets.
//!
//! Each manipulation subsystem (grabber, launcher, lift) is a short chain of
//! states. Every call to [`Sequencer::advance`] performs exactly one blocking
//! actuator call, holds for the configured delay, and steps to the next state
//! without feedback; the delay constants are the only completion contract.
//! The orchestrator drives the sequencers through the fixed task scripts in
//! [`scripts`].

use core::fmt;
use core::time::Duration;

use crate::drive::DriveCommand;

pub mod grabber;
pub mod launcher;
pub mod lift;
pub mod scripts;

pub use grabber::{Grabber, GrabberRequest, GrabberState};
pub use launcher::{Launcher, LauncherRequest, LauncherState};
pub use lift::{Lift, LiftRequest, LiftState};
pub use scripts::{
    COLLECT_FIRST_TEMPLATE, COLLECT_REPEAT_TEMPLATE, DELIVER_TEMPLATE, LAUNCH_TEMPLATE,
    ScriptKind, ScriptReport, ScriptStep, ScriptTemplate, collect_template,
};

/// Identifier for the manipulation subsystems.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequencerId {
    Grabber,
    Launcher,
    Lift,
}

impl SequencerId {
    /// Deterministic index for per-subsystem tables.
    pub const fn as_index(self) -> usize {
        match self {
            SequencerId::Grabber => 0,
            SequencerId::Launcher => 1,
            SequencerId::Lift => 2,
        }
    }

    /// Attempts to construct a [`SequencerId`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(SequencerId::Grabber),
            1 => Some(SequencerId::Launcher),
            2 => Some(SequencerId::Lift),
            _ => None,
        }
    }
}

impl fmt::Display for SequencerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerId::Grabber => f.write_str("grabber"),
            SequencerId::Launcher => f.write_str("launcher"),
            SequencerId::Lift => f.write_str("lift"),
        }
    }
}

/// Lift height targeted by a raise request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LiftStage {
    /// Full rise from the stowed position, used before anything has been delivered.
    First,
    /// Shorter rise used once the lift has been partly reset.
    Repeat,
}

impl fmt::Display for LiftStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiftStage::First => f.write_str("first"),
            LiftStage::Repeat => f.write_str("repeat"),
        }
    }
}

/// Hardware that rejected or failed an actuator command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorError {
    Drive,
    Grabber,
    Launcher,
    Lift,
    Reinitialize,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::Drive => f.write_str("drive command failed"),
            ActuatorError::Grabber => f.write_str("grabber command failed"),
            ActuatorError::Launcher => f.write_str("launcher command failed"),
            ActuatorError::Lift => f.write_str("lift command failed"),
            ActuatorError::Reinitialize => f.write_str("actuator re-initialization failed"),
        }
    }
}

/// Hardware boundary for the drivetrain and every manipulation subsystem.
///
/// Subsystem calls are expected to return once the command is issued; the
/// sequencers hold for the configured delay afterwards.
pub trait ActuatorPort {
    fn set_drive(&mut self, command: &DriveCommand) -> Result<(), ActuatorError>;
    fn stop_drive(&mut self) -> Result<(), ActuatorError>;

    fn grab(&mut self) -> Result<(), ActuatorError>;
    fn retract(&mut self) -> Result<(), ActuatorError>;
    fn extend_to_target(&mut self) -> Result<(), ActuatorError>;
    fn dispense(&mut self) -> Result<(), ActuatorError>;
    fn stop_grabber(&mut self) -> Result<(), ActuatorError>;

    fn run_launcher(&mut self) -> Result<(), ActuatorError>;
    fn stop_launcher(&mut self) -> Result<(), ActuatorError>;

    fn raise_lift(&mut self, stage: LiftStage) -> Result<(), ActuatorError>;
    fn increment_lift(&mut self) -> Result<(), ActuatorError>;
    fn clear_lift(&mut self) -> Result<(), ActuatorError>;
    fn lower_lift(&mut self) -> Result<(), ActuatorError>;
    fn reset_lift(&mut self) -> Result<(), ActuatorError>;
    fn stop_lift(&mut self) -> Result<(), ActuatorError>;

    /// Re-establishes communication with the actuator drivers.
    fn reinitialize(&mut self) -> Result<(), ActuatorError>;
}

/// Blocks the caller for a fixed interval.
pub trait BlockingDelay {
    fn block_for(&mut self, duration: Duration);
}

/// Delay that returns immediately.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDelay;

impl BlockingDelay for NoopDelay {
    fn block_for(&mut self, _duration: Duration) {}
}

/// Result of advancing a sequencer by one edge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequencerOutput {
    /// `true` once the sequencer is back at rest.
    pub finished: bool,
}

impl SequencerOutput {
    pub const fn finished() -> Self {
        Self { finished: true }
    }

    pub const fn in_progress() -> Self {
        Self { finished: false }
    }
}

/// Errors raised while driving a sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceError {
    /// The underlying actuator call failed.
    Actuator(ActuatorError),
    /// A new request reached a sequencer that was still mid-script.
    Busy(SequencerId),
    /// A script ended with a sequencer away from rest.
    Unfinished(SequencerId),
}

impl From<ActuatorError> for SequenceError {
    fn from(error: ActuatorError) -> Self {
        Self::Actuator(error)
    }
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::Actuator(error) => error.fmt(f),
            SequenceError::Busy(id) => write!(f, "{id} sequencer is busy"),
            SequenceError::Unfinished(id) => write!(f, "{id} sequencer left mid-script"),
        }
    }
}

/// Common surface the orchestrator uses to drive every subsystem.
pub trait Sequencer {
    /// Script selector accepted while at rest.
    type Request: Copy;
    /// Closed set of positions along the chain.
    type State: Copy + Eq;

    const ID: SequencerId;

    fn state(&self) -> Self::State;

    fn is_idle(&self) -> bool;

    /// Performs the next edge of the chain.
    ///
    /// At rest, `Some(request)` starts a script and `None` is a no-op that
    /// reports `finished`. Mid-script, `None` continues and `Some(_)` is
    /// rejected as [`SequenceError::Busy`].
    fn advance<A, D>(
        &mut self,
        request: Option<Self::Request>,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<SequencerOutput, SequenceError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized;

    /// Runs a full script from rest and returns the number of edges taken.
    fn run_to_idle<A, D>(
        &mut self,
        request: Self::Request,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<u8, SequenceError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        let mut edges = 1;
        let mut output = self.advance(Some(request), actuators, delay)?;
        while !output.finished {
            output = self.advance(None, actuators, delay)?;
            edges += 1;
        }
        Ok(edges)
    }
}

/// Issues one actuator call and then holds for `hold`.
pub(crate) fn act_and_hold<A, D, F>(
    actuators: &mut A,
    delay: &mut D,
    hold: Duration,
    action: F,
) -> Result<(), SequenceError>
where
    A: ActuatorPort + ?Sized,
    D: BlockingDelay + ?Sized,
    F: FnOnce(&mut A) -> Result<(), ActuatorError>,
{
    action(actuators)?;
    delay.block_for(hold);
    Ok(())
}

/// The three subsystem sequencers owned by the orchestrator.
#[derive(Clone, Debug)]
pub struct Sequencers {
    pub grabber: Grabber,
    pub launcher: Launcher,
    pub lift: Lift,
}

impl Sequencers {
    #[must_use]
    pub const fn new(timings: crate::config::SequenceTimings) -> Self {
        Self {
            grabber: Grabber::new(timings),
            launcher: Launcher::new(timings),
            lift: Lift::new(timings),
        }
    }

    /// `true` when every subsystem is at rest.
    #[must_use]
    pub fn all_idle(&self) -> bool {
        self.grabber.is_idle() && self.launcher.is_idle() && self.lift.is_idle()
    }

    /// First subsystem found away from rest.
    #[must_use]
    pub fn first_busy(&self) -> Option<SequencerId> {
        if !self.grabber.is_idle() {
            Some(SequencerId::Grabber)
        } else if !self.launcher.is_idle() {
            Some(SequencerId::Launcher)
        } else if !self.lift.is_idle() {
            Some(SequencerId::Lift)
        } else {
            None
        }
    }
}

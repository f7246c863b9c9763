//! Grabber sequencer: linear actuator arm plus the rotating collector.
//!
//! Collect grabs from the primary target and stows the load. Deliver extends
//! over a cup, dispenses and stows. Release dispenses in place, used while the
//! launcher belt is running.

use core::fmt;

use crate::config::SequenceTimings;

use super::{
    ActuatorPort, BlockingDelay, SequenceError, Sequencer, SequencerId, SequencerOutput,
    act_and_hold,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GrabberRequest {
    Collect,
    Deliver,
    Release,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GrabberState {
    Idle,
    /// Arm extended with the load captured; next edge retracts.
    Holding,
    /// Arm extended over the target; next edge dispenses.
    Extended,
    /// Load dispensed with the arm still out; next edge retracts.
    Dispensed,
}

impl fmt::Display for GrabberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrabberState::Idle => f.write_str("idle"),
            GrabberState::Holding => f.write_str("holding"),
            GrabberState::Extended => f.write_str("extended"),
            GrabberState::Dispensed => f.write_str("dispensed"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Grabber {
    state: GrabberState,
    timings: SequenceTimings,
}

impl Grabber {
    pub const fn new(timings: SequenceTimings) -> Self {
        Self {
            state: GrabberState::Idle,
            timings,
        }
    }
}

impl Sequencer for Grabber {
    type Request = GrabberRequest;
    type State = GrabberState;

    const ID: SequencerId = SequencerId::Grabber;

    fn state(&self) -> GrabberState {
        self.state
    }

    fn is_idle(&self) -> bool {
        self.state == GrabberState::Idle
    }

    fn advance<A, D>(
        &mut self,
        request: Option<GrabberRequest>,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<SequencerOutput, SequenceError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        let t = &self.timings;
        let next = match (self.state, request) {
            (GrabberState::Idle, None) => GrabberState::Idle,
            (GrabberState::Idle, Some(GrabberRequest::Collect)) => {
                act_and_hold(actuators, delay, t.grab, |a| a.grab())?;
                GrabberState::Holding
            }
            (GrabberState::Idle, Some(GrabberRequest::Deliver)) => {
                act_and_hold(actuators, delay, t.extend_to_target, |a| a.extend_to_target())?;
                GrabberState::Extended
            }
            (GrabberState::Idle, Some(GrabberRequest::Release)) => {
                act_and_hold(actuators, delay, t.dispense, |a| a.dispense())?;
                GrabberState::Idle
            }
            (GrabberState::Holding | GrabberState::Dispensed, None) => {
                act_and_hold(actuators, delay, t.retract, |a| a.retract())?;
                GrabberState::Idle
            }
            (GrabberState::Extended, None) => {
                act_and_hold(actuators, delay, t.dispense, |a| a.dispense())?;
                GrabberState::Dispensed
            }
            (_, Some(_)) => return Err(SequenceError::Busy(Self::ID)),
        };

        self.state = next;
        Ok(if self.is_idle() {
            SequencerOutput::finished()
        } else {
            SequencerOutput::in_progress()
        })
    }
}

//! Scissor lift sequencer driven by a stepper motor.
//!
//! A raise request starts the full lift cycle used while collecting:
//! raise, bump up by one increment, clear the collector, then lower back to
//! the carry height. Reset returns the lift to its stowed height.

use core::fmt;

use crate::config::SequenceTimings;

use super::{
    ActuatorPort, BlockingDelay, LiftStage, SequenceError, Sequencer, SequencerId,
    SequencerOutput, act_and_hold,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LiftRequest {
    Raise(LiftStage),
    Reset,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LiftState {
    Idle,
    Raised,
    Incremented,
    Cleared,
}

impl fmt::Display for LiftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiftState::Idle => f.write_str("idle"),
            LiftState::Raised => f.write_str("raised"),
            LiftState::Incremented => f.write_str("incremented"),
            LiftState::Cleared => f.write_str("cleared"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Lift {
    state: LiftState,
    timings: SequenceTimings,
}

impl Lift {
    pub const fn new(timings: SequenceTimings) -> Self {
        Self {
            state: LiftState::Idle,
            timings,
        }
    }
}

impl Sequencer for Lift {
    type Request = LiftRequest;
    type State = LiftState;

    const ID: SequencerId = SequencerId::Lift;

    fn state(&self) -> LiftState {
        self.state
    }

    fn is_idle(&self) -> bool {
        self.state == LiftState::Idle
    }

    fn advance<A, D>(
        &mut self,
        request: Option<LiftRequest>,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<SequencerOutput, SequenceError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        let t = self.timings;
        self.state = match (self.state, request) {
            (LiftState::Idle, None) => LiftState::Idle,
            (LiftState::Idle, Some(LiftRequest::Raise(stage))) => {
                act_and_hold(actuators, delay, t.lift_raise, |a| a.raise_lift(stage))?;
                LiftState::Raised
            }
            (LiftState::Idle, Some(LiftRequest::Reset)) => {
                act_and_hold(actuators, delay, t.lift_reset, |a| a.reset_lift())?;
                LiftState::Idle
            }
            (LiftState::Raised, None) => {
                act_and_hold(actuators, delay, t.lift_increment, |a| a.increment_lift())?;
                LiftState::Incremented
            }
            (LiftState::Incremented, None) => {
                act_and_hold(actuators, delay, t.lift_clear, |a| a.clear_lift())?;
                LiftState::Cleared
            }
            (LiftState::Cleared, None) => {
                act_and_hold(actuators, delay, t.lift_lower, |a| a.lower_lift())?;
                LiftState::Idle
            }
            (_, Some(_)) => return Err(SequenceError::Busy(Self::ID)),
        };

        Ok(if self.is_idle() {
            SequencerOutput::finished()
        } else {
            SequencerOutput::in_progress()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::COMPETITION_TIMINGS;
    use crate::sequences::testing::{Call, Recorder, TotalDelay};

    #[test]
    fn raise_cycle_walks_every_height() {
        let mut lift = Lift::new(COMPETITION_TIMINGS);
        let mut hw = Recorder::default();
        let mut delay = TotalDelay::default();

        let edges = lift
            .run_to_idle(LiftRequest::Raise(LiftStage::Repeat), &mut hw, &mut delay)
            .expect("lift cycle completes");

        assert_eq!(edges, 4);
        assert_eq!(
            hw.calls.as_slice(),
            &[
                Call::Raise(LiftStage::Repeat),
                Call::Increment,
                Call::Clear,
                Call::Lower
            ]
        );
        assert!(lift.is_idle());
    }

    #[test]
    fn reset_returns_immediately_to_idle() {
        let mut lift = Lift::new(COMPETITION_TIMINGS);
        let mut hw = Recorder::default();
        let mut delay = TotalDelay::default();

        let edges = lift
            .run_to_idle(LiftRequest::Reset, &mut hw, &mut delay)
            .expect("reset");
        assert_eq!(edges, 1);
        assert_eq!(hw.calls.as_slice(), &[Call::Reset]);
        assert_eq!(delay.total, COMPETITION_TIMINGS.lift_reset);
    }
}

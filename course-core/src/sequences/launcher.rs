//! Launcher sequencer: a belt that flings the load into the net.

use core::fmt;

use crate::config::SequenceTimings;

use super::{
    ActuatorPort, BlockingDelay, SequenceError, Sequencer, SequencerId, SequencerOutput,
    act_and_hold,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LauncherRequest {
    Launch,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LauncherState {
    Idle,
    /// Belt spinning; next edge stops it.
    Launching,
}

impl fmt::Display for LauncherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LauncherState::Idle => f.write_str("idle"),
            LauncherState::Launching => f.write_str("launching"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Launcher {
    state: LauncherState,
    timings: SequenceTimings,
}

impl Launcher {
    pub const fn new(timings: SequenceTimings) -> Self {
        Self {
            state: LauncherState::Idle,
            timings,
        }
    }
}

impl Sequencer for Launcher {
    type Request = LauncherRequest;
    type State = LauncherState;

    const ID: SequencerId = SequencerId::Launcher;

    fn state(&self) -> LauncherState {
        self.state
    }

    fn is_idle(&self) -> bool {
        self.state == LauncherState::Idle
    }

    fn advance<A, D>(
        &mut self,
        request: Option<LauncherRequest>,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<SequencerOutput, SequenceError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        self.state = match (self.state, request) {
            (LauncherState::Idle, None) => LauncherState::Idle,
            (LauncherState::Idle, Some(LauncherRequest::Launch)) => {
                act_and_hold(actuators, delay, self.timings.launcher_spin_up, |a| {
                    a.run_launcher()
                })?;
                LauncherState::Launching
            }
            (LauncherState::Launching, None) => {
                act_and_hold(actuators, delay, self.timings.launcher_stop, |a| {
                    a.stop_launcher()
                })?;
                LauncherState::Idle
            }
            (LauncherState::Launching, Some(_)) => return Err(SequenceError::Busy(Self::ID)),
        };

        Ok(match self.state {
            LauncherState::Idle => SequencerOutput::finished(),
            LauncherState::Launching => SequencerOutput::in_progress(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::COMPETITION_TIMINGS;
    use crate::sequences::testing::{Call, Recorder, TotalDelay};

    #[test]
    fn launch_spins_up_then_stops() {
        let mut launcher = Launcher::new(COMPETITION_TIMINGS);
        let mut hw = Recorder::default();
        let mut delay = TotalDelay::default();

        let edges = launcher
            .run_to_idle(LauncherRequest::Launch, &mut hw, &mut delay)
            .expect("launch completes");

        assert_eq!(edges, 2);
        assert_eq!(hw.calls.as_slice(), &[Call::RunLauncher, Call::StopLauncher]);
        assert_eq!(
            delay.total,
            COMPETITION_TIMINGS.launcher_spin_up + COMPETITION_TIMINGS.launcher_stop
        );
    }

    #[test]
    fn idle_advance_without_request_is_a_no_op() {
        let mut launcher = Launcher::new(COMPETITION_TIMINGS);
        let mut hw = Recorder::default();
        let mut delay = TotalDelay::default();

        let output = launcher.advance(None, &mut hw, &mut delay).expect("no-op");
        assert!(output.finished);
        assert!(hw.calls.is_empty());
        assert_eq!(delay.holds, 0);
    }
}

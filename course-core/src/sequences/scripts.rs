//! Fixed task scripts interleaving the subsystem sequencers.
//!
//! A script is an ordered list of single sequencer edges. Running one walks
//! the list strictly in order, so only one actuator call is ever in flight,
//! and verifies every sequencer is back at rest when the list is exhausted.

use core::fmt;

use super::{
    ActuatorPort, BlockingDelay, GrabberRequest, LauncherRequest, LiftRequest, LiftStage,
    SequenceError, Sequencer, SequencerId, Sequencers,
};

/// Which task a script performs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScriptKind {
    Collect(LiftStage),
    Deliver,
    Launch,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Collect(stage) => write!(f, "collect ({stage} rise)"),
            ScriptKind::Deliver => f.write_str("deliver"),
            ScriptKind::Launch => f.write_str("launch"),
        }
    }
}

/// One sequencer edge. `None` continues the sequencer's current chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScriptStep {
    Grabber(Option<GrabberRequest>),
    Launcher(Option<LauncherRequest>),
    Lift(Option<LiftRequest>),
}

impl ScriptStep {
    #[must_use]
    pub const fn sequencer(&self) -> SequencerId {
        match self {
            ScriptStep::Grabber(_) => SequencerId::Grabber,
            ScriptStep::Launcher(_) => SequencerId::Launcher,
            ScriptStep::Lift(_) => SequencerId::Lift,
        }
    }

    fn apply<A, D>(
        self,
        sequencers: &mut Sequencers,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<(), SequenceError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        match self {
            ScriptStep::Grabber(request) => sequencers.grabber.advance(request, actuators, delay),
            ScriptStep::Launcher(request) => {
                sequencers.launcher.advance(request, actuators, delay)
            }
            ScriptStep::Lift(request) => sequencers.lift.advance(request, actuators, delay),
        }
        .map(|_| ())
    }
}

/// Immutable task script.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScriptTemplate {
    pub kind: ScriptKind,
    pub steps: &'static [ScriptStep],
}

/// Summary of a completed script.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScriptReport {
    pub kind: ScriptKind,
    pub edges: u8,
}

impl ScriptTemplate {
    pub const fn new(kind: ScriptKind, steps: &'static [ScriptStep]) -> Self {
        Self { kind, steps }
    }

    /// Returns the number of edges in the script.
    #[must_use]
    pub const fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Executes every edge in order and checks all sequencers end at rest.
    pub fn run<A, D>(
        &self,
        sequencers: &mut Sequencers,
        actuators: &mut A,
        delay: &mut D,
    ) -> Result<ScriptReport, SequenceError>
    where
        A: ActuatorPort + ?Sized,
        D: BlockingDelay + ?Sized,
    {
        if let Some(busy) = sequencers.first_busy() {
            return Err(SequenceError::Busy(busy));
        }

        let mut edges: u8 = 0;
        for step in self.steps {
            step.apply(sequencers, actuators, delay)?;
            edges = edges.saturating_add(1);
        }

        if let Some(busy) = sequencers.first_busy() {
            return Err(SequenceError::Unfinished(busy));
        }

        Ok(ScriptReport {
            kind: self.kind,
            edges,
        })
    }
}

/// Collect from a primary target before anything has been delivered.
pub const COLLECT_FIRST_STEPS: [ScriptStep; 6] = collect_steps(LiftStage::First);
/// Collect from a primary target after the lift has been used.
pub const COLLECT_REPEAT_STEPS: [ScriptStep; 6] = collect_steps(LiftStage::Repeat);

const fn collect_steps(stage: LiftStage) -> [ScriptStep; 6] {
    [
        // Raise the lift under the target so the collector can reach it.
        ScriptStep::Lift(Some(LiftRequest::Raise(stage))),
        ScriptStep::Grabber(Some(GrabberRequest::Collect)),
        // Bump the lift to free the load from the target.
        ScriptStep::Lift(None),
        ScriptStep::Grabber(None),
        ScriptStep::Lift(None),
        ScriptStep::Lift(None),
    ]
}

/// Extend over a cup, drop the load, and stow.
pub const DELIVER_STEPS: [ScriptStep; 3] = [
    ScriptStep::Grabber(Some(GrabberRequest::Deliver)),
    ScriptStep::Grabber(None),
    ScriptStep::Grabber(None),
];

/// Spin the belt, feed the load onto it, and stop.
pub const LAUNCH_STEPS: [ScriptStep; 3] = [
    ScriptStep::Launcher(Some(LauncherRequest::Launch)),
    ScriptStep::Grabber(Some(GrabberRequest::Release)),
    ScriptStep::Launcher(None),
];

pub const COLLECT_FIRST_TEMPLATE: ScriptTemplate =
    ScriptTemplate::new(ScriptKind::Collect(LiftStage::First), &COLLECT_FIRST_STEPS);
pub const COLLECT_REPEAT_TEMPLATE: ScriptTemplate =
    ScriptTemplate::new(ScriptKind::Collect(LiftStage::Repeat), &COLLECT_REPEAT_STEPS);
pub const DELIVER_TEMPLATE: ScriptTemplate =
    ScriptTemplate::new(ScriptKind::Deliver, &DELIVER_STEPS);
pub const LAUNCH_TEMPLATE: ScriptTemplate = ScriptTemplate::new(ScriptKind::Launch, &LAUNCH_STEPS);

/// Collect script for the requested lift stage.
#[must_use]
pub const fn collect_template(stage: LiftStage) -> ScriptTemplate {
    match stage {
        LiftStage::First => COLLECT_FIRST_TEMPLATE,
        LiftStage::Repeat => COLLECT_REPEAT_TEMPLATE,
    }
}

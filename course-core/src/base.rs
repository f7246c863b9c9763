//! Base motion state machine.
//!
//! Converts each [`SensorSnapshot`] into a [`DriveCommand`]. The transition
//! function is pure over `(state, snapshot)`; every threshold comes from
//! [`NavigationThresholds`].

use core::fmt;

use crate::config::NavigationThresholds;
use crate::drive::{Direction, DriveCommand, DutyLevel};
use crate::sensors::SensorSnapshot;

/// Navigation states of the wheeled base.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BaseState {
    Start,
    Cruise,
    PrepareTurnAround,
    TurnAround,
    VeerLeft,
    VeerRight,
    TurnLeft,
    TurnRight,
    Finish,
}

/// Every base state, in declaration order.
pub const ALL_BASE_STATES: [BaseState; 9] = [
    BaseState::Start,
    BaseState::Cruise,
    BaseState::PrepareTurnAround,
    BaseState::TurnAround,
    BaseState::VeerLeft,
    BaseState::VeerRight,
    BaseState::TurnLeft,
    BaseState::TurnRight,
    BaseState::Finish,
];

impl BaseState {
    /// Drive command emitted while in this state.
    #[must_use]
    pub const fn output(self) -> DriveCommand {
        use Direction::{Forward, Reverse};
        use DutyLevel::{High, Low};

        match self {
            BaseState::Start => DriveCommand::new(High, Forward, High, Forward, false),
            BaseState::Cruise => DriveCommand::new(High, Forward, High, Forward, true),
            BaseState::PrepareTurnAround | BaseState::TurnAround | BaseState::TurnLeft => {
                DriveCommand::new(High, Reverse, High, Forward, false)
            }
            BaseState::TurnRight => DriveCommand::new(High, Forward, High, Reverse, false),
            BaseState::VeerLeft => DriveCommand::new(Low, Forward, High, Forward, true),
            BaseState::VeerRight => DriveCommand::new(High, Forward, Low, Forward, true),
            BaseState::Finish => DriveCommand::stopped(),
        }
    }

    /// `true` for states where pausing forward progress is safe.
    #[must_use]
    pub const fn is_cruising(self) -> bool {
        self.output().cruising
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, BaseState::Finish)
    }

    /// Short kebab-case name used in logs and the console.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BaseState::Start => "start",
            BaseState::Cruise => "cruise",
            BaseState::PrepareTurnAround => "prepare-turn-around",
            BaseState::TurnAround => "turn-around",
            BaseState::VeerLeft => "veer-left",
            BaseState::VeerRight => "veer-right",
            BaseState::TurnLeft => "turn-left",
            BaseState::TurnRight => "turn-right",
            BaseState::Finish => "finish",
        }
    }
}

impl fmt::Display for BaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Line-following state machine for the wheeled base.
#[derive(Clone, Debug)]
pub struct BaseMotionFsm {
    state: BaseState,
    thresholds: NavigationThresholds,
}

impl BaseMotionFsm {
    pub const fn new(thresholds: NavigationThresholds) -> Self {
        Self {
            state: BaseState::Start,
            thresholds,
        }
    }

    #[must_use]
    pub const fn state(&self) -> BaseState {
        self.state
    }

    #[must_use]
    pub const fn thresholds(&self) -> &NavigationThresholds {
        &self.thresholds
    }

    /// Advances one tick and returns the command for the new state.
    pub fn transition(&mut self, snapshot: &SensorSnapshot) -> DriveCommand {
        self.state = next_state(self.state, snapshot, &self.thresholds);
        self.state.output()
    }
}

/// Pure transition table for the base.
#[must_use]
pub fn next_state(
    state: BaseState,
    input: &SensorSnapshot,
    limits: &NavigationThresholds,
) -> BaseState {
    let line = input.line;
    let offset = line.offset();

    match state {
        BaseState::Start => {
            if input.front_middle < limits.start_veer_distance {
                veer_toward(offset).unwrap_or(BaseState::Start)
            } else {
                BaseState::Start
            }
        }
        BaseState::Cruise => from_cruise(input, limits),
        BaseState::PrepareTurnAround => {
            if line.left <= limits.pivot_left_max && line.right <= limits.pivot_right_max {
                BaseState::TurnAround
            } else {
                BaseState::PrepareTurnAround
            }
        }
        BaseState::TurnAround => {
            if line.both_sides_seen() {
                BaseState::Cruise
            } else if line.right > limits.turn_around_exit {
                BaseState::TurnRight
            } else if line.left > limits.turn_around_exit {
                BaseState::TurnLeft
            } else {
                BaseState::TurnAround
            }
        }
        BaseState::VeerLeft => {
            if is_centred(input, limits) {
                BaseState::Cruise
            } else if line.left < 1.0 && line.right > 0.0 {
                BaseState::VeerRight
            } else if line.left <= 0.0
                || offset > 0.0
                || input.front_middle < limits.veer_abort_distance
            {
                BaseState::Cruise
            } else {
                BaseState::VeerLeft
            }
        }
        BaseState::VeerRight => {
            if is_centred(input, limits) {
                BaseState::Cruise
            } else if line.right < 1.0 && line.left > 0.0 {
                BaseState::VeerLeft
            } else if line.right <= 0.0
                || offset < 0.0
                || input.front_middle < limits.veer_abort_distance
            {
                BaseState::Cruise
            } else {
                BaseState::VeerRight
            }
        }
        BaseState::TurnLeft => {
            if offset.abs() < 1.0 && line.both_sides_seen() {
                BaseState::Cruise
            } else if line.left > 0.0 && line.left < limits.turn_settle_magnitude {
                BaseState::VeerLeft
            } else {
                BaseState::TurnLeft
            }
        }
        BaseState::TurnRight => {
            if offset.abs() < 1.0 && line.both_sides_seen() {
                BaseState::Cruise
            } else if line.right > 0.0 && line.right < limits.turn_settle_magnitude {
                BaseState::VeerRight
            } else {
                BaseState::TurnRight
            }
        }
        BaseState::Finish => BaseState::Finish,
    }
}

#[allow(clippy::float_cmp)]
fn from_cruise(input: &SensorSnapshot, limits: &NavigationThresholds) -> BaseState {
    let line = input.line;
    let offset = line.offset();
    let boxed_in = input.front_left < limits.boxed_in_distance
        && input.front_right < limits.boxed_in_distance;

    if boxed_in && input.front_middle < limits.finish_distance && is_centred(input, limits) {
        return BaseState::Finish;
    }
    if boxed_in
        && input.front_middle < limits.turn_around_distance
        && line.left != limits.centred_magnitude
        && line.right != limits.centred_magnitude
    {
        return BaseState::PrepareTurnAround;
    }
    if input.front_middle < limits.turn_left_distance
        && input.front_left > limits.open_side_distance
    {
        return BaseState::TurnLeft;
    }
    if input.front_middle < limits.turn_right_distance
        && input.front_right > limits.open_side_distance
    {
        return BaseState::TurnRight;
    }
    if let Some(turn_at) = limits.offset_turn
        && offset.abs() >= turn_at
    {
        return if offset < 0.0 {
            BaseState::TurnLeft
        } else {
            BaseState::TurnRight
        };
    }
    if input.front_middle > limits.clear_ahead_distance
        && let Some(veer) = veer_toward(offset)
    {
        return veer;
    }
    BaseState::Cruise
}

fn veer_toward(offset: f32) -> Option<BaseState> {
    if offset < 0.0 {
        Some(BaseState::VeerLeft)
    } else if offset > 0.0 {
        Some(BaseState::VeerRight)
    } else {
        None
    }
}

#[allow(clippy::float_cmp)]
fn is_centred(input: &SensorSnapshot, limits: &NavigationThresholds) -> bool {
    input.line.left == limits.centred_magnitude && input.line.right == limits.centred_magnitude
}

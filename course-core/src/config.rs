//! Course configuration bundle.
//!
//! Every threshold, debounce count and actuator delay the state machines use
//! lives here. A [`CourseConfig`] is built once, validated, and then handed by
//! value to each component; nothing reads tuning constants from anywhere else.

use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::drive::DutyProfile;

/// Maximum number of end-marker checkpoints a course may declare.
pub const MAX_CHECKPOINTS: usize = 4;

/// Distance and line thresholds consumed by the base motion state machine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NavigationThresholds {
    /// Front-middle distance under which the start state begins correcting.
    pub start_veer_distance: f32,
    /// Side distance under which both flanks count as boxed in.
    pub boxed_in_distance: f32,
    /// Front-middle distance that ends the course when boxed in and centred.
    pub finish_distance: f32,
    /// Front-middle distance that starts a turn-around when boxed in off-line.
    pub turn_around_distance: f32,
    /// Front-middle distance that starts a left turn when the left side is open.
    pub turn_left_distance: f32,
    /// Front-middle distance that starts a right turn when the right side is open.
    pub turn_right_distance: f32,
    /// Side distance above which a flank counts as open.
    pub open_side_distance: f32,
    /// Front-middle distance above which veering is allowed from cruise.
    pub clear_ahead_distance: f32,
    /// Front-middle distance that cancels an in-progress veer.
    pub veer_abort_distance: f32,
    /// Line offset that forces a full turn, if any.
    pub offset_turn: Option<f32>,
    /// Per-side magnitude reported when the whole array sees the line.
    pub centred_magnitude: f32,
    /// Largest left magnitude that still allows the pivot to begin.
    pub pivot_left_max: f32,
    /// Largest right magnitude that still allows the pivot to begin.
    pub pivot_right_max: f32,
    /// Magnitude on one side that converts a pivot into a partial turn.
    pub turn_around_exit: f32,
    /// Magnitude under which a turn settles into a veer.
    pub turn_settle_magnitude: f32,
}

/// Detection and rejection distances for the task orchestrator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TaskThresholds {
    pub bottom_detect: f32,
    pub top_detect: f32,
    /// Distance both readings must exceed to leave a cooldown.
    pub reject: f32,
}

/// Ticks of forward travel between first detection and acting on a target.
///
/// The approach becomes ready on the tick its counter reaches the value, so a
/// count of `n` means `n` ticks of travel after the detection tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebounceTicks {
    pub first_target: u16,
    pub repeat_target: u16,
    pub cup: u16,
    pub net: u16,
}

/// Hold time after every open-loop actuator call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceTimings {
    pub grab: Duration,
    pub retract: Duration,
    pub extend_to_target: Duration,
    pub dispense: Duration,
    pub launcher_spin_up: Duration,
    pub launcher_stop: Duration,
    pub lift_raise: Duration,
    pub lift_increment: Duration,
    pub lift_clear: Duration,
    pub lift_lower: Duration,
    pub lift_reset: Duration,
}

/// Secondary-target counts that switch the orchestrator into end-marker search.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Checkpoints {
    pub end_markers: Vec<u8, MAX_CHECKPOINTS>,
    /// Count at which passing an end marker re-arms the primary target search.
    pub primary_rearm: u8,
}

impl Checkpoints {
    /// `true` when `count` requires an end-marker search.
    #[must_use]
    pub fn is_end_marker(&self, count: u8) -> bool {
        self.end_markers.contains(&count)
    }
}

/// Complete configuration bundle accepted by the control loop.
#[derive(Clone, Debug, PartialEq)]
pub struct CourseConfig {
    pub tick_period: Duration,
    pub navigation: NavigationThresholds,
    pub task: TaskThresholds,
    pub debounce: DebounceTicks,
    pub timings: SequenceTimings,
    pub duty: DutyProfile,
    pub secondary_target_cap: u8,
    pub checkpoints: Checkpoints,
    /// Consecutive sensor faults tolerated before the course aborts; 0 disables the limit.
    pub max_consecutive_sensor_faults: u16,
}

/// Configuration rejected before a course starts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroTickPeriod,
    /// A distance threshold is negative or not finite.
    InvalidDistance(&'static str),
    /// The rejection distance sits below a detection distance.
    RejectBelowDetect,
    /// A debounce count of zero would act on the detection tick itself.
    ZeroDebounce(&'static str),
    ZeroSecondaryCap,
    /// A checkpoint lies beyond the secondary-target cap.
    CheckpointBeyondCap(u8),
    DutyOutOfRange,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTickPeriod => f.write_str("tick period must be non-zero"),
            ConfigError::InvalidDistance(name) => {
                write!(f, "{name} must be a finite, non-negative distance")
            }
            ConfigError::RejectBelowDetect => {
                f.write_str("reject distance must not be below either detect distance")
            }
            ConfigError::ZeroDebounce(name) => write!(f, "{name} debounce must be at least 1"),
            ConfigError::ZeroSecondaryCap => f.write_str("secondary target cap must be non-zero"),
            ConfigError::CheckpointBeyondCap(count) => {
                write!(f, "checkpoint {count} exceeds the secondary target cap")
            }
            ConfigError::DutyOutOfRange => {
                f.write_str("duty levels must satisfy low <= mid <= high <= 100")
            }
        }
    }
}

/// Sequence hold times measured on the competition robot.
pub const COMPETITION_TIMINGS: SequenceTimings = SequenceTimings {
    grab: Duration::from_millis(1_500),
    retract: Duration::from_millis(800),
    extend_to_target: Duration::from_millis(900),
    dispense: Duration::from_millis(1_200),
    launcher_spin_up: Duration::from_millis(1_000),
    launcher_stop: Duration::from_millis(1_500),
    lift_raise: Duration::from_millis(2_000),
    lift_increment: Duration::from_millis(400),
    lift_clear: Duration::from_millis(600),
    lift_lower: Duration::from_millis(1_600),
    lift_reset: Duration::from_millis(2_400),
};

/// Navigation thresholds tuned on the competition track, in centimetres.
pub const COMPETITION_NAVIGATION: NavigationThresholds = NavigationThresholds {
    start_veer_distance: 35.0,
    boxed_in_distance: 15.0,
    finish_distance: 6.0,
    turn_around_distance: 8.0,
    turn_left_distance: 9.5,
    turn_right_distance: 10.0,
    open_side_distance: 20.0,
    clear_ahead_distance: 22.0,
    veer_abort_distance: 10.0,
    offset_turn: None,
    centred_magnitude: 10.0,
    pivot_left_max: 3.0,
    pivot_right_max: 0.0,
    turn_around_exit: 5.0,
    turn_settle_magnitude: 3.0,
};

impl CourseConfig {
    /// Tuning set used on the competition track.
    #[must_use]
    pub fn competition() -> Self {
        let mut end_markers = Vec::new();
        // Capacity is MAX_CHECKPOINTS; two entries always fit.
        let _ = end_markers.push(3);
        let _ = end_markers.push(5);

        Self {
            tick_period: Duration::from_micros(16_667),
            navigation: COMPETITION_NAVIGATION,
            task: TaskThresholds {
                bottom_detect: 17.5,
                top_detect: 21.0,
                reject: 22.0,
            },
            debounce: DebounceTicks {
                first_target: 11,
                repeat_target: 13,
                cup: 20,
                net: 4,
            },
            timings: COMPETITION_TIMINGS,
            duty: DutyProfile::new(80, 90, 100),
            secondary_target_cap: 6,
            checkpoints: Checkpoints {
                end_markers,
                primary_rearm: 3,
            },
            max_consecutive_sensor_faults: 0,
        }
    }

    /// Checks the bundle for values the state machines cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }

        for (name, value) in self.distances() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidDistance(name));
            }
        }
        if let Some(offset) = self.navigation.offset_turn
            && (!offset.is_finite() || offset <= 0.0)
        {
            return Err(ConfigError::InvalidDistance("offset-turn"));
        }

        if self.task.reject < self.task.bottom_detect || self.task.reject < self.task.top_detect {
            return Err(ConfigError::RejectBelowDetect);
        }

        for (name, ticks) in [
            ("first-target", self.debounce.first_target),
            ("repeat-target", self.debounce.repeat_target),
            ("cup", self.debounce.cup),
            ("net", self.debounce.net),
        ] {
            if ticks == 0 {
                return Err(ConfigError::ZeroDebounce(name));
            }
        }

        if self.secondary_target_cap == 0 {
            return Err(ConfigError::ZeroSecondaryCap);
        }
        for &count in self
            .checkpoints
            .end_markers
            .iter()
            .chain(core::iter::once(&self.checkpoints.primary_rearm))
        {
            if count > self.secondary_target_cap {
                return Err(ConfigError::CheckpointBeyondCap(count));
            }
        }

        if !self.duty.is_ordered() {
            return Err(ConfigError::DutyOutOfRange);
        }

        Ok(())
    }

    fn distances(&self) -> [(&'static str, f32); 17] {
        let nav = &self.navigation;
        [
            ("start-veer", nav.start_veer_distance),
            ("boxed-in", nav.boxed_in_distance),
            ("finish", nav.finish_distance),
            ("turn-around", nav.turn_around_distance),
            ("turn-left", nav.turn_left_distance),
            ("turn-right", nav.turn_right_distance),
            ("open-side", nav.open_side_distance),
            ("clear-ahead", nav.clear_ahead_distance),
            ("veer-abort", nav.veer_abort_distance),
            ("centred", nav.centred_magnitude),
            ("pivot-left", nav.pivot_left_max),
            ("pivot-right", nav.pivot_right_max),
            ("turn-around-exit", nav.turn_around_exit),
            ("turn-settle", nav.turn_settle_magnitude),
            ("bottom-detect", self.task.bottom_detect),
            ("top-detect", self.task.top_detect),
            ("reject", self.task.reject),
        ]
    }
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self::competition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn competition_profile_is_valid() {
        assert_eq!(CourseConfig::competition().validate(), Ok(()));
    }

    #[test]
    fn zero_tick_period_is_rejected() {
        let mut config = CourseConfig::competition();
        config.tick_period = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickPeriod));
    }

    #[test]
    fn reject_must_clear_detection() {
        let mut config = CourseConfig::competition();
        config.task.reject = 20.0;
        assert_eq!(config.validate(), Err(ConfigError::RejectBelowDetect));
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let mut config = CourseConfig::competition();
        config.debounce.cup = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroDebounce("cup")));
    }

    #[test]
    fn checkpoints_must_fit_under_cap() {
        let mut config = CourseConfig::competition();
        config.secondary_target_cap = 4;
        assert_eq!(config.validate(), Err(ConfigError::CheckpointBeyondCap(5)));
    }

    #[test]
    fn non_finite_distance_is_rejected() {
        let mut config = CourseConfig::competition();
        config.navigation.finish_distance = f32::NAN;
        assert_eq!(config.validate(), Err(ConfigError::InvalidDistance("finish")));
    }

    #[test]
    fn end_marker_lookup() {
        let config = CourseConfig::competition();
        assert!(config.checkpoints.is_end_marker(3));
        assert!(config.checkpoints.is_end_marker(5));
        assert!(!config.checkpoints.is_end_marker(4));
    }
}

//! Tunable configuration parameters exposed through `show` and `set`.

use core::fmt;
use core::time::Duration;

use crate::config::CourseConfig;

/// Literal accepted on the console.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Integer(u32),
    Decimal(f32),
    Duration(Duration),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Decimal(value) => write!(f, "{value:.1}"),
            Value::Duration(duration) => write!(f, "{}ms", duration.as_millis()),
        }
    }
}

/// Unit family a parameter is stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// Centimetres or line magnitude; integers and decimals both accepted.
    Distance,
    /// Distance where `0` disables the feature.
    OptionalDistance,
    /// Tick or event count.
    Count,
    /// Duty percentage.
    Percent,
    Time,
}

impl ParamKind {
    #[must_use]
    pub const fn expected(self) -> &'static str {
        match self {
            ParamKind::Distance | ParamKind::OptionalDistance => "distance",
            ParamKind::Count => "count",
            ParamKind::Percent => "percentage",
            ParamKind::Time => "duration",
        }
    }
}

/// Rejected parameter writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamError {
    /// The literal has the wrong unit for the parameter.
    TypeMismatch {
        param: Param,
        expected: &'static str,
    },
    /// The literal does not fit the parameter's storage.
    OutOfRange(Param),
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::TypeMismatch { param, expected } => {
                write!(f, "{param} expects a {expected}")
            }
            ParamError::OutOfRange(param) => write!(f, "value out of range for {param}"),
        }
    }
}

macro_rules! params {
    ($($variant:ident => $name:literal, $kind:ident, $summary:literal;)+) => {
        /// Every tunable field of [`CourseConfig`].
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum Param {
            $($variant,)+
        }

        /// Parameters in `show` order.
        pub const ALL_PARAMS: &[Param] = &[$(Param::$variant,)+];

        impl Param {
            /// Console spelling.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Param::$variant => $name,)+
                }
            }

            #[must_use]
            pub const fn kind(self) -> ParamKind {
                match self {
                    $(Param::$variant => ParamKind::$kind,)+
                }
            }

            /// One-line help text.
            #[must_use]
            pub const fn summary(self) -> &'static str {
                match self {
                    $(Param::$variant => $summary,)+
                }
            }
        }
    };
}

params! {
    TickPeriod => "tick", Time, "control loop period";
    StartVeer => "start-veer", Distance, "front distance at which the start run begins correcting";
    BoxedIn => "boxed-in", Distance, "side distance that counts as walled in";
    Finish => "finish", Distance, "front distance that ends the course when boxed in and centred";
    TurnAround => "turn-around", Distance, "front distance that starts a dead-end turn";
    TurnLeft => "turn-left", Distance, "front distance for a left corner";
    TurnRight => "turn-right", Distance, "front distance for a right corner";
    OpenSide => "open-side", Distance, "side distance that counts as open";
    ClearAhead => "clear-ahead", Distance, "front distance required before veering";
    VeerAbort => "veer-abort", Distance, "front distance that cancels a veer";
    OffsetTurn => "offset-turn", OptionalDistance, "line offset that forces a corner turn, 0 disables";
    Centred => "centred", Distance, "line magnitude on both sides that counts as centred";
    PivotLeft => "pivot-left", Distance, "left magnitude limit before pivoting";
    PivotRight => "pivot-right", Distance, "right magnitude limit before pivoting";
    TurnAroundExit => "turn-around-exit", Distance, "magnitude that ends a pivot into a corner turn";
    TurnSettle => "turn-settle", Distance, "magnitude below which a turn hands over to a veer";
    BottomDetect => "bottom-detect", Distance, "bottom distance that counts as a target";
    TopDetect => "top-detect", Distance, "top distance that counts as a target";
    Reject => "reject", Distance, "distance that clears a cooldown";
    FirstTarget => "first-target", Count, "ticks of travel before acting on the first primary target";
    RepeatTarget => "repeat-target", Count, "ticks of travel before acting on later primary targets";
    Cup => "cup", Count, "ticks of travel before dropping into a cup";
    Net => "net", Count, "ticks of travel before launching into a net";
    Grab => "grab", Time, "hold after closing the collector";
    Retract => "retract", Time, "hold after stowing the collector";
    Extend => "extend", Time, "hold after extending over a target";
    Dispense => "dispense", Time, "hold after opening the collector";
    SpinUp => "spin-up", Time, "launcher belt spin-up hold";
    LauncherStop => "launcher-stop", Time, "launcher belt run-down hold";
    LiftRaise => "lift-raise", Time, "hold after raising the lift";
    LiftIncrement => "lift-increment", Time, "hold after bumping the lift";
    LiftClear => "lift-clear", Time, "hold after clearing the collector";
    LiftLower => "lift-lower", Time, "hold after lowering the lift";
    LiftReset => "lift-reset", Time, "hold after stowing the lift";
    DutyLow => "duty-low", Percent, "PWM duty for the low level";
    DutyMid => "duty-mid", Percent, "PWM duty for the mid level";
    DutyHigh => "duty-high", Percent, "PWM duty for the high level";
    SecondaryCap => "secondary-cap", Count, "secondary targets handled before the course ends";
    PrimaryRearm => "primary-rearm", Count, "secondary count at which the primary search re-arms";
    MaxSensorFaults => "max-sensor-faults", Count, "consecutive faulty ticks tolerated, 0 disables";
}

impl Param {
    /// Finds a parameter by name (case insensitive).
    #[must_use]
    pub fn find(name: &str) -> Option<Self> {
        ALL_PARAMS
            .iter()
            .copied()
            .find(|param| param.name().eq_ignore_ascii_case(name))
    }

    /// Current value of the parameter in `config`.
    #[must_use]
    pub fn read(self, config: &CourseConfig) -> Value {
        let nav = &config.navigation;
        let t = &config.timings;
        match self {
            Param::TickPeriod => Value::Duration(config.tick_period),
            Param::StartVeer => Value::Decimal(nav.start_veer_distance),
            Param::BoxedIn => Value::Decimal(nav.boxed_in_distance),
            Param::Finish => Value::Decimal(nav.finish_distance),
            Param::TurnAround => Value::Decimal(nav.turn_around_distance),
            Param::TurnLeft => Value::Decimal(nav.turn_left_distance),
            Param::TurnRight => Value::Decimal(nav.turn_right_distance),
            Param::OpenSide => Value::Decimal(nav.open_side_distance),
            Param::ClearAhead => Value::Decimal(nav.clear_ahead_distance),
            Param::VeerAbort => Value::Decimal(nav.veer_abort_distance),
            Param::OffsetTurn => Value::Decimal(nav.offset_turn.unwrap_or(0.0)),
            Param::Centred => Value::Decimal(nav.centred_magnitude),
            Param::PivotLeft => Value::Decimal(nav.pivot_left_max),
            Param::PivotRight => Value::Decimal(nav.pivot_right_max),
            Param::TurnAroundExit => Value::Decimal(nav.turn_around_exit),
            Param::TurnSettle => Value::Decimal(nav.turn_settle_magnitude),
            Param::BottomDetect => Value::Decimal(config.task.bottom_detect),
            Param::TopDetect => Value::Decimal(config.task.top_detect),
            Param::Reject => Value::Decimal(config.task.reject),
            Param::FirstTarget => Value::Integer(config.debounce.first_target.into()),
            Param::RepeatTarget => Value::Integer(config.debounce.repeat_target.into()),
            Param::Cup => Value::Integer(config.debounce.cup.into()),
            Param::Net => Value::Integer(config.debounce.net.into()),
            Param::Grab => Value::Duration(t.grab),
            Param::Retract => Value::Duration(t.retract),
            Param::Extend => Value::Duration(t.extend_to_target),
            Param::Dispense => Value::Duration(t.dispense),
            Param::SpinUp => Value::Duration(t.launcher_spin_up),
            Param::LauncherStop => Value::Duration(t.launcher_stop),
            Param::LiftRaise => Value::Duration(t.lift_raise),
            Param::LiftIncrement => Value::Duration(t.lift_increment),
            Param::LiftClear => Value::Duration(t.lift_clear),
            Param::LiftLower => Value::Duration(t.lift_lower),
            Param::LiftReset => Value::Duration(t.lift_reset),
            Param::DutyLow => Value::Integer(config.duty.low.into()),
            Param::DutyMid => Value::Integer(config.duty.mid.into()),
            Param::DutyHigh => Value::Integer(config.duty.high.into()),
            Param::SecondaryCap => Value::Integer(config.secondary_target_cap.into()),
            Param::PrimaryRearm => Value::Integer(config.checkpoints.primary_rearm.into()),
            Param::MaxSensorFaults => Value::Integer(config.max_consecutive_sensor_faults.into()),
        }
    }

    /// Stores `value` into `config`. Cross-field checks are left to
    /// [`CourseConfig::validate`].
    pub fn write(self, config: &mut CourseConfig, value: Value) -> Result<(), ParamError> {
        match self.kind() {
            ParamKind::Distance => {
                let distance = self.distance(value)?;
                *self.distance_slot(config)? = distance;
            }
            ParamKind::OptionalDistance => {
                let distance = self.distance(value)?;
                config.navigation.offset_turn = (distance > 0.0).then_some(distance);
            }
            ParamKind::Count | ParamKind::Percent => {
                let Value::Integer(count) = value else {
                    return Err(self.mismatch());
                };
                self.write_count(config, count)?;
            }
            ParamKind::Time => {
                let Value::Duration(duration) = value else {
                    return Err(self.mismatch());
                };
                *self.time_slot(config)? = duration;
            }
        }
        Ok(())
    }

    const fn mismatch(self) -> ParamError {
        ParamError::TypeMismatch {
            param: self,
            expected: self.kind().expected(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn distance(self, value: Value) -> Result<f32, ParamError> {
        match value {
            Value::Integer(value) => Ok(value as f32),
            Value::Decimal(value) => Ok(value),
            Value::Duration(_) => Err(self.mismatch()),
        }
    }

    fn distance_slot(self, config: &mut CourseConfig) -> Result<&mut f32, ParamError> {
        let nav = &mut config.navigation;
        Ok(match self {
            Param::StartVeer => &mut nav.start_veer_distance,
            Param::BoxedIn => &mut nav.boxed_in_distance,
            Param::Finish => &mut nav.finish_distance,
            Param::TurnAround => &mut nav.turn_around_distance,
            Param::TurnLeft => &mut nav.turn_left_distance,
            Param::TurnRight => &mut nav.turn_right_distance,
            Param::OpenSide => &mut nav.open_side_distance,
            Param::ClearAhead => &mut nav.clear_ahead_distance,
            Param::VeerAbort => &mut nav.veer_abort_distance,
            Param::Centred => &mut nav.centred_magnitude,
            Param::PivotLeft => &mut nav.pivot_left_max,
            Param::PivotRight => &mut nav.pivot_right_max,
            Param::TurnAroundExit => &mut nav.turn_around_exit,
            Param::TurnSettle => &mut nav.turn_settle_magnitude,
            Param::BottomDetect => &mut config.task.bottom_detect,
            Param::TopDetect => &mut config.task.top_detect,
            Param::Reject => &mut config.task.reject,
            _ => return Err(self.mismatch()),
        })
    }

    fn time_slot(self, config: &mut CourseConfig) -> Result<&mut Duration, ParamError> {
        let t = &mut config.timings;
        Ok(match self {
            Param::TickPeriod => &mut config.tick_period,
            Param::Grab => &mut t.grab,
            Param::Retract => &mut t.retract,
            Param::Extend => &mut t.extend_to_target,
            Param::Dispense => &mut t.dispense,
            Param::SpinUp => &mut t.launcher_spin_up,
            Param::LauncherStop => &mut t.launcher_stop,
            Param::LiftRaise => &mut t.lift_raise,
            Param::LiftIncrement => &mut t.lift_increment,
            Param::LiftClear => &mut t.lift_clear,
            Param::LiftLower => &mut t.lift_lower,
            Param::LiftReset => &mut t.lift_reset,
            _ => return Err(self.mismatch()),
        })
    }

    fn write_count(self, config: &mut CourseConfig, count: u32) -> Result<(), ParamError> {
        let narrow = |count: u32| u16::try_from(count).map_err(|_| ParamError::OutOfRange(self));
        let byte = |count: u32| u8::try_from(count).map_err(|_| ParamError::OutOfRange(self));
        match self {
            Param::FirstTarget => config.debounce.first_target = narrow(count)?,
            Param::RepeatTarget => config.debounce.repeat_target = narrow(count)?,
            Param::Cup => config.debounce.cup = narrow(count)?,
            Param::Net => config.debounce.net = narrow(count)?,
            Param::MaxSensorFaults => config.max_consecutive_sensor_faults = narrow(count)?,
            Param::DutyLow => config.duty.low = byte(count)?,
            Param::DutyMid => config.duty.mid = byte(count)?,
            Param::DutyHigh => config.duty.high = byte(count)?,
            Param::SecondaryCap => config.secondary_target_cap = byte(count)?,
            Param::PrimaryRearm => config.checkpoints.primary_rearm = byte(count)?,
            _ => return Err(self.mismatch()),
        }
        Ok(())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_param_reads_back_what_it_wrote() {
        let mut config = CourseConfig::competition();
        for &param in ALL_PARAMS {
            let current = param.read(&config);
            param
                .write(&mut config, current)
                .unwrap_or_else(|error| panic!("{param}: {error}"));
            assert_eq!(param.read(&config), current, "{param}");
        }
    }

    #[test]
    fn names_are_unique_and_resolvable() {
        for (index, param) in ALL_PARAMS.iter().enumerate() {
            assert_eq!(Param::find(param.name()), Some(*param));
            for other in &ALL_PARAMS[index + 1..] {
                assert_ne!(param.name(), other.name());
            }
        }
        assert_eq!(Param::find("BOTTOM-DETECT"), Some(Param::BottomDetect));
        assert_eq!(Param::find("warp-speed"), None);
    }

    #[test]
    fn distances_accept_integers() {
        let mut config = CourseConfig::competition();
        Param::Reject.write(&mut config, Value::Integer(30)).expect("integer distance");
        assert!((config.task.reject - 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_offset_turn_disables_it() {
        let mut config = CourseConfig::competition();
        Param::OffsetTurn
            .write(&mut config, Value::Decimal(6.0))
            .expect("enable");
        assert_eq!(config.navigation.offset_turn, Some(6.0));
        Param::OffsetTurn
            .write(&mut config, Value::Integer(0))
            .expect("disable");
        assert_eq!(config.navigation.offset_turn, None);
    }

    #[test]
    fn wrong_units_are_rejected() {
        let mut config = CourseConfig::competition();
        assert_eq!(
            Param::Grab.write(&mut config, Value::Integer(5)),
            Err(ParamError::TypeMismatch {
                param: Param::Grab,
                expected: "duration",
            })
        );
        assert_eq!(
            Param::DutyHigh.write(&mut config, Value::Integer(300)),
            Err(ParamError::OutOfRange(Param::DutyHigh))
        );
    }
}

//! Wheel drive commands produced by the base motion state machine.

use core::fmt;

/// Discrete duty settings understood by the wheel motor drivers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DutyLevel {
    Off,
    Low,
    Mid,
    High,
}

impl DutyLevel {
    /// Deterministic index for lookups into per-level tables.
    pub const fn as_index(self) -> usize {
        match self {
            DutyLevel::Off => 0,
            DutyLevel::Low => 1,
            DutyLevel::Mid => 2,
            DutyLevel::High => 3,
        }
    }

    /// Attempts to construct a [`DutyLevel`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(DutyLevel::Off),
            1 => Some(DutyLevel::Low),
            2 => Some(DutyLevel::Mid),
            3 => Some(DutyLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for DutyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DutyLevel::Off => "off",
            DutyLevel::Low => "low",
            DutyLevel::Mid => "mid",
            DutyLevel::High => "high",
        };
        f.write_str(label)
    }
}

/// Rotation direction for one wheel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("fwd"),
            Direction::Reverse => f.write_str("rev"),
        }
    }
}

/// Maps duty levels onto PWM percentages for a particular drivetrain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DutyProfile {
    pub low: u8,
    pub mid: u8,
    pub high: u8,
}

impl DutyProfile {
    /// Largest percentage any level may map to.
    pub const MAX_PERCENT: u8 = 100;

    pub const fn new(low: u8, mid: u8, high: u8) -> Self {
        Self { low, mid, high }
    }

    /// Returns the PWM percentage for `level`.
    #[must_use]
    pub const fn percent(&self, level: DutyLevel) -> u8 {
        match level {
            DutyLevel::Off => 0,
            DutyLevel::Low => self.low,
            DutyLevel::Mid => self.mid,
            DutyLevel::High => self.high,
        }
    }

    /// `true` when every level is bounded and the levels are ordered.
    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        self.high <= Self::MAX_PERCENT && self.low <= self.mid && self.mid <= self.high
    }
}

/// Per-wheel duty and direction plus the cruising flag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DriveCommand {
    pub left_duty: DutyLevel,
    pub right_duty: DutyLevel,
    pub left_dir: Direction,
    pub right_dir: Direction,
    pub cruising: bool,
}

impl DriveCommand {
    pub const fn new(
        left_duty: DutyLevel,
        left_dir: Direction,
        right_duty: DutyLevel,
        right_dir: Direction,
        cruising: bool,
    ) -> Self {
        Self {
            left_duty,
            right_duty,
            left_dir,
            right_dir,
            cruising,
        }
    }

    /// Both wheels off, facing forward, not cruising.
    pub const fn stopped() -> Self {
        Self::new(
            DutyLevel::Off,
            Direction::Forward,
            DutyLevel::Off,
            Direction::Forward,
            false,
        )
    }

    /// Same command with zero duty on both wheels. Directions are kept.
    #[must_use]
    pub const fn with_zero_duty(self) -> Self {
        Self {
            left_duty: DutyLevel::Off,
            right_duty: DutyLevel::Off,
            ..self
        }
    }

    /// `true` when neither wheel is being driven.
    #[must_use]
    pub const fn is_stationary(&self) -> bool {
        matches!(self.left_duty, DutyLevel::Off) && matches!(self.right_duty, DutyLevel::Off)
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L={} {} R={} {}",
            self.left_duty, self.left_dir, self.right_duty, self.right_dir
        )?;
        if self.cruising {
            f.write_str(" cruising")?;
        }
        Ok(())
    }
}

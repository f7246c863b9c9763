//! Board support shared by the hardware ports.
//!
//! The conversions and the lift bookkeeping here are plain functions so they
//! can be exercised on the host; the embassy drivers that use them live in
//! [`board`] and only build for the MCU.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::convert::TryFrom;

use course_core::sequences::{ActuatorError, LiftStage};
use embassy_time::Duration;

#[cfg(target_os = "none")]
pub mod board;

/// Full-scale reading of the 12-bit ADC.
pub const ADC_FULL_SCALE: u16 = 4095;
/// Readings at or above this level mean a shorted or unplugged sensor.
pub const ADC_FAULT_LEVEL: u16 = 4000;
/// Readings below this level are beyond the sensor's range.
pub const ADC_RANGE_FLOOR: u16 = 120;
/// Farthest distance reported, in centimetres.
pub const MAX_RANGE_CM: f32 = 150.0;

const IR_NUMERATOR: f32 = 13_000.0;
const IR_OFFSET: f32 = 40.0;

/// Readings averaged by each distance channel.
pub const RANGE_WINDOW: usize = 4;

/// Converts a raw IR ranger sample into centimetres.
///
/// `None` marks a faulted channel. Out-of-range samples come back as `0.0`
/// so the range filter drops them.
pub fn raw_to_centimetres(raw: u16) -> Option<f32> {
    if raw >= ADC_FAULT_LEVEL {
        return None;
    }
    if raw < ADC_RANGE_FLOOR {
        return Some(0.0);
    }
    let distance = IR_NUMERATOR / (f32::from(raw) - IR_OFFSET);
    Some(distance.min(MAX_RANGE_CM))
}

/// Converts a `core` duration into an embassy one, saturating on overflow.
pub fn to_embassy(duration: core::time::Duration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

/// Direction the lift stepper moves in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Travel {
    Up,
    Down,
}

/// Lift request translated into stepper motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiftMove {
    Raise(LiftStage),
    Increment,
    Clear,
    Lower,
    Reset,
}

/// Step counts for each lift move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiftSteps {
    pub first_raise: u16,
    pub repeat_raise: u16,
    pub increment: u16,
    pub clear: u16,
    pub lower: u16,
    /// Highest position the scissor lift can reach.
    pub ceiling: u16,
}

pub const SCISSOR_LIFT: LiftSteps = LiftSteps {
    first_raise: 1_200,
    repeat_raise: 600,
    increment: 150,
    clear: 250,
    lower: 400,
    ceiling: 3_200,
};

/// Tracks the lift height so moves can be checked against its limits.
#[derive(Debug)]
pub struct LiftTravel {
    steps: LiftSteps,
    position: u16,
}

impl LiftTravel {
    pub const fn new(steps: LiftSteps) -> Self {
        Self { steps, position: 0 }
    }

    pub const fn position(&self) -> u16 {
        self.position
    }

    /// Works out the motion for `request` and commits the new position.
    pub fn plan(&mut self, request: LiftMove) -> Result<(Travel, u16), ActuatorError> {
        let (travel, count) = match request {
            LiftMove::Raise(LiftStage::First) => (Travel::Up, self.steps.first_raise),
            LiftMove::Raise(LiftStage::Repeat) => (Travel::Up, self.steps.repeat_raise),
            LiftMove::Increment => (Travel::Up, self.steps.increment),
            LiftMove::Clear => (Travel::Up, self.steps.clear),
            LiftMove::Lower => (Travel::Down, self.steps.lower),
            LiftMove::Reset => (Travel::Down, self.position),
        };

        let target = match travel {
            Travel::Up => self
                .position
                .checked_add(count)
                .filter(|target| *target <= self.steps.ceiling),
            Travel::Down => self.position.checked_sub(count),
        };
        self.position = target.ok_or(ActuatorError::Lift)?;
        Ok((travel, count))
    }

    /// Forgets the tracked height, e.g. after the lift was homed by hand.
    pub fn rehome(&mut self) {
        self.position = 0;
    }
}

const PHASES: u8 = 4;

/// Full-step drive sequence for a two-phase stepper, as coil levels `[A+, A-, B+, B-]`.
const FULL_STEP: [[bool; 4]; PHASES as usize] = [
    [true, false, true, false],
    [false, true, true, false],
    [false, true, false, true],
    [true, false, false, true],
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepperPhase(u8);

impl StepperPhase {
    #[must_use]
    pub const fn next(self, travel: Travel) -> Self {
        match travel {
            Travel::Up => Self((self.0 + 1) % PHASES),
            Travel::Down => Self((self.0 + PHASES - 1) % PHASES),
        }
    }

    pub fn coils(self) -> [bool; 4] {
        FULL_STEP[usize::from(self.0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc_extremes_map_to_fault_and_dropout() {
        assert_eq!(raw_to_centimetres(ADC_FULL_SCALE), None);
        assert_eq!(raw_to_centimetres(0), Some(0.0));
        let near = raw_to_centimetres(2_000).expect("valid sample");
        let far = raw_to_centimetres(400).expect("valid sample");
        assert!(near < far);
        assert!(far <= MAX_RANGE_CM);
    }

    #[test]
    fn lift_rejects_moves_past_its_limits() {
        let mut lift = LiftTravel::new(SCISSOR_LIFT);
        assert_eq!(lift.plan(LiftMove::Lower), Err(ActuatorError::Lift));
        assert_eq!(lift.position(), 0);

        assert_eq!(
            lift.plan(LiftMove::Raise(LiftStage::First)),
            Ok((Travel::Up, 1_200))
        );
        lift.plan(LiftMove::Increment).expect("within range");
        lift.plan(LiftMove::Clear).expect("within range");
        lift.plan(LiftMove::Lower).expect("within range");
        assert_eq!(lift.position(), 1_200);

        assert_eq!(lift.plan(LiftMove::Raise(LiftStage::First)), Ok((Travel::Up, 1_200)));
        assert_eq!(
            lift.plan(LiftMove::Raise(LiftStage::First)),
            Err(ActuatorError::Lift)
        );

        assert_eq!(lift.plan(LiftMove::Reset), Ok((Travel::Down, 2_400)));
        assert_eq!(lift.position(), 0);
    }

    #[test]
    fn stepper_phases_wrap_both_ways() {
        let start = StepperPhase::default();
        let mut phase = start;
        for _ in 0..4 {
            phase = phase.next(Travel::Up);
        }
        assert_eq!(phase, start);
        assert_eq!(start.next(Travel::Down).coils(), FULL_STEP[3]);
    }

    #[test]
    fn durations_convert_to_embassy_ticks() {
        let converted = to_embassy(core::time::Duration::from_millis(16));
        assert_eq!(converted.as_micros(), 16_000);
    }
}

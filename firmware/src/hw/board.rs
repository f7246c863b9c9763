//! Embassy drivers behind the course ports.

use course_core::drive::{Direction, DriveCommand, DutyProfile};
use course_core::sensors::{
    ALL_CHANNELS, LineArray, LinePosition, RangeFilter, SensorChannel, SensorFault, SensorPort,
};
use course_core::sequences::{ActuatorError, ActuatorPort, BlockingDelay, LiftStage};
use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::gpio::{Input, Level, Output};
use embassy_stm32::peripherals::{ADC1, TIM3};
use embassy_stm32::timer::simple_pwm::SimplePwmChannel;
use embassy_time::{Duration, block_for};

use super::{LiftMove, LiftTravel, RANGE_WINDOW, SCISSOR_LIFT, StepperPhase, Travel, raw_to_centimetres, to_embassy};

/// Dwell between lift steps.
const STEP_DWELL: Duration = Duration::from_millis(2);
/// How long the collector rotor runs for a grab or a dispense.
const ROTOR_PULSE: Duration = Duration::from_millis(300);
const ROTOR_DUTY: u8 = 60;
/// Extension used to hover the collector over a cup.
const CUP_EXTENSION: u8 = 70;

/// IR rangers on ADC1 plus the eight-element line array.
pub struct BoardSensors<'d> {
    adc: Adc<'d, ADC1>,
    channels: [AnyAdcChannel<ADC1>; ALL_CHANNELS.len()],
    filters: [RangeFilter<RANGE_WINDOW>; ALL_CHANNELS.len()],
    line: [Input<'d>; LineArray::ELEMENTS],
}

impl<'d> BoardSensors<'d> {
    /// `channels` are ordered like [`ALL_CHANNELS`]; `line` from the leftmost element.
    pub fn new(
        mut adc: Adc<'d, ADC1>,
        channels: [AnyAdcChannel<ADC1>; ALL_CHANNELS.len()],
        line: [Input<'d>; LineArray::ELEMENTS],
    ) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            adc,
            channels,
            filters: Default::default(),
            line,
        }
    }
}

impl SensorPort for BoardSensors<'_> {
    fn read_distance(&mut self, channel: SensorChannel) -> Result<f32, SensorFault> {
        let index = channel.as_index();
        let raw = self.adc.blocking_read(&mut self.channels[index]);
        let distance = raw_to_centimetres(raw).ok_or(SensorFault::Distance(channel))?;
        Ok(self.filters[index].push(distance))
    }

    fn read_line_position(&mut self) -> Result<LinePosition, SensorFault> {
        let bits = self
            .line
            .iter()
            .enumerate()
            .filter(|(_, input)| input.is_high())
            .fold(0_u8, |bits, (index, _)| bits | (1 << index));
        Ok(LineArray::magnitudes(bits))
    }

    fn reinitialize(&mut self) -> Result<(), SensorFault> {
        self.adc.set_sample_time(SampleTime::CYCLES160_5);
        for filter in &mut self.filters {
            filter.clear();
        }
        Ok(())
    }
}

/// One wheel: PWM on TIM3 plus a direction line.
pub struct Wheel<'d> {
    pwm: SimplePwmChannel<'d, TIM3>,
    direction: Output<'d>,
}

impl<'d> Wheel<'d> {
    pub fn new(mut pwm: SimplePwmChannel<'d, TIM3>, direction: Output<'d>) -> Self {
        pwm.set_duty_cycle_fully_off();
        pwm.enable();
        Self { pwm, direction }
    }

    fn drive(&mut self, percent: u8, direction: Direction) {
        match direction {
            Direction::Forward => self.direction.set_low(),
            Direction::Reverse => self.direction.set_high(),
        }
        self.pwm.set_duty_cycle_percent(percent.min(DutyProfile::MAX_PERCENT));
    }

    fn stop(&mut self) {
        self.pwm.set_duty_cycle_fully_off();
    }
}

/// Collector: a linear actuator for reach and a rotor that closes or tips it.
pub struct Grabber<'d> {
    extender: SimplePwmChannel<'d, TIM3>,
    rotor: SimplePwmChannel<'d, TIM3>,
    rotor_direction: Output<'d>,
}

impl<'d> Grabber<'d> {
    pub fn new(
        mut extender: SimplePwmChannel<'d, TIM3>,
        mut rotor: SimplePwmChannel<'d, TIM3>,
        rotor_direction: Output<'d>,
    ) -> Self {
        extender.set_duty_cycle_fully_off();
        extender.enable();
        rotor.set_duty_cycle_fully_off();
        rotor.enable();
        Self {
            extender,
            rotor,
            rotor_direction,
        }
    }

    fn pulse_rotor(&mut self, level: Level) {
        self.rotor_direction.set_level(level);
        self.rotor.set_duty_cycle_percent(ROTOR_DUTY);
        block_for(ROTOR_PULSE);
        self.rotor.set_duty_cycle_fully_off();
        self.rotor_direction.set_low();
    }

    fn stop(&mut self) {
        self.rotor.set_duty_cycle_fully_off();
        self.rotor_direction.set_low();
    }
}

/// Scissor lift stepper on four coil outputs.
pub struct Lift<'d> {
    coils: [Output<'d>; 4],
    phase: StepperPhase,
    travel: LiftTravel,
}

impl<'d> Lift<'d> {
    pub fn new(coils: [Output<'d>; 4]) -> Self {
        Self {
            coils,
            phase: StepperPhase::default(),
            travel: LiftTravel::new(SCISSOR_LIFT),
        }
    }

    fn apply(&mut self, request: LiftMove) -> Result<(), ActuatorError> {
        let (travel, steps) = self.travel.plan(request)?;
        for _ in 0..steps {
            self.phase = self.phase.next(travel);
            for (coil, level) in self.coils.iter_mut().zip(self.phase.coils()) {
                coil.set_level(Level::from(level));
            }
            block_for(STEP_DWELL);
        }
        Ok(())
    }

    fn release(&mut self) {
        for coil in &mut self.coils {
            coil.set_low();
        }
    }
}

/// Every actuator on the robot.
pub struct BoardActuators<'d> {
    duty: DutyProfile,
    left: Wheel<'d>,
    right: Wheel<'d>,
    grabber: Grabber<'d>,
    launcher: Output<'d>,
    lift: Lift<'d>,
}

impl<'d> BoardActuators<'d> {
    pub fn new(
        duty: DutyProfile,
        left: Wheel<'d>,
        right: Wheel<'d>,
        grabber: Grabber<'d>,
        launcher: Output<'d>,
        lift: Lift<'d>,
    ) -> Self {
        Self {
            duty,
            left,
            right,
            grabber,
            launcher,
            lift,
        }
    }
}

impl ActuatorPort for BoardActuators<'_> {
    fn set_drive(&mut self, command: &DriveCommand) -> Result<(), ActuatorError> {
        self.left
            .drive(self.duty.percent(command.left_duty), command.left_dir);
        self.right
            .drive(self.duty.percent(command.right_duty), command.right_dir);
        Ok(())
    }

    fn stop_drive(&mut self) -> Result<(), ActuatorError> {
        self.left.stop();
        self.right.stop();
        Ok(())
    }

    fn grab(&mut self) -> Result<(), ActuatorError> {
        self.grabber.pulse_rotor(Level::Low);
        Ok(())
    }

    fn retract(&mut self) -> Result<(), ActuatorError> {
        self.grabber.extender.set_duty_cycle_fully_off();
        Ok(())
    }

    fn extend_to_target(&mut self) -> Result<(), ActuatorError> {
        self.grabber.extender.set_duty_cycle_percent(CUP_EXTENSION);
        Ok(())
    }

    fn dispense(&mut self) -> Result<(), ActuatorError> {
        self.grabber.pulse_rotor(Level::High);
        Ok(())
    }

    fn stop_grabber(&mut self) -> Result<(), ActuatorError> {
        self.grabber.stop();
        Ok(())
    }

    fn run_launcher(&mut self) -> Result<(), ActuatorError> {
        self.launcher.set_high();
        Ok(())
    }

    fn stop_launcher(&mut self) -> Result<(), ActuatorError> {
        self.launcher.set_low();
        Ok(())
    }

    fn raise_lift(&mut self, stage: LiftStage) -> Result<(), ActuatorError> {
        self.lift.apply(LiftMove::Raise(stage))
    }

    fn increment_lift(&mut self) -> Result<(), ActuatorError> {
        self.lift.apply(LiftMove::Increment)
    }

    fn clear_lift(&mut self) -> Result<(), ActuatorError> {
        self.lift.apply(LiftMove::Clear)
    }

    fn lower_lift(&mut self) -> Result<(), ActuatorError> {
        self.lift.apply(LiftMove::Lower)
    }

    fn reset_lift(&mut self) -> Result<(), ActuatorError> {
        self.lift.apply(LiftMove::Reset)
    }

    fn stop_lift(&mut self) -> Result<(), ActuatorError> {
        self.lift.release();
        Ok(())
    }

    fn reinitialize(&mut self) -> Result<(), ActuatorError> {
        self.left.stop();
        self.right.stop();
        self.grabber.stop();
        self.grabber.extender.set_duty_cycle_fully_off();
        self.launcher.set_low();
        self.lift.release();
        self.lift.travel.rehome();
        Ok(())
    }
}

/// Busy-waits on the embassy clock. Sequencer holds block the course task.
pub struct EmbassyDelay;

impl BlockingDelay for EmbassyDelay {
    fn block_for(&mut self, duration: core::time::Duration) {
        block_for(to_embassy(duration));
    }
}

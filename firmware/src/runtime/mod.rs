use cortex_m::interrupt;
use cortex_m::register::primask;
use course_core::config::CourseConfig;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, OutputType, Pull, Speed};
use embassy_stm32::time::khz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;

use crate::hw::board::{BoardActuators, BoardSensors, Grabber, Lift, Wheel};

mod course_task;
mod start_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Raised by the button when no course is running.
pub(super) static START: Signal<CriticalSectionRawMutex, ()> = Signal::new();
/// Raised by the button while a course is running.
pub(super) static STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();

static CONFIG: StaticCell<CourseConfig> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals {
        ADC1,
        TIM3,
        EXTI15,
        PA0,
        PA1,
        PA2,
        PA3,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PA9,
        PA10,
        PA11,
        PA12,
        PA15,
        PB0,
        PB1,
        PB2,
        PB3,
        PB4,
        PB5,
        PB6,
        PB7,
        PB8,
        PB9,
        PC6,
        PC15,
        ..
    } = hal::init(hal::Config::default());

    let config: &'static CourseConfig = CONFIG.init(CourseConfig::competition());

    // Rangers in sensor channel order, line array from the leftmost element.
    let sensors = BoardSensors::new(
        Adc::new(ADC1),
        [
            PA0.degrade_adc(),
            PA1.degrade_adc(),
            PA2.degrade_adc(),
            PA3.degrade_adc(),
            PA4.degrade_adc(),
        ],
        [
            Input::new(PA8, Pull::Down),
            Input::new(PA9, Pull::Down),
            Input::new(PA10, Pull::Down),
            Input::new(PA11, Pull::Down),
            Input::new(PA12, Pull::Down),
            Input::new(PB7, Pull::Down),
            Input::new(PB8, Pull::Down),
            Input::new(PB9, Pull::Down),
        ],
    );

    let pwm = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        Some(PwmPin::new(PA7, OutputType::PushPull)),
        Some(PwmPin::new(PB0, OutputType::PushPull)),
        Some(PwmPin::new(PB1, OutputType::PushPull)),
        khz(10),
        CountingMode::EdgeAlignedUp,
    );
    let channels = pwm.split();

    let actuators = BoardActuators::new(
        config.duty,
        Wheel::new(channels.ch1, Output::new(PA5, Level::Low, Speed::Low)),
        Wheel::new(channels.ch2, Output::new(PB2, Level::Low, Speed::Low)),
        Grabber::new(
            channels.ch3,
            channels.ch4,
            Output::new(PC6, Level::Low, Speed::Low),
        ),
        Output::new(PA15, Level::Low, Speed::Low),
        Lift::new([
            Output::new(PB3, Level::Low, Speed::Low),
            Output::new(PB4, Level::Low, Speed::Low),
            Output::new(PB5, Level::Low, Speed::Low),
            Output::new(PB6, Level::Low, Speed::Low),
        ]),
    );

    let button = ExtiInput::new(PC15, EXTI15, Pull::Down);

    spawner
        .spawn(course_task::run(config, sensors, actuators))
        .expect("failed to spawn course task");
    spawner
        .spawn(start_task::run(button))
        .expect("failed to spawn start button task");

    core::future::pending::<()>().await;
}

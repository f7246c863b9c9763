use embassy_stm32::exti::ExtiInput;
use embassy_time::{Duration, Timer};

use super::{START, STOP};
use crate::status;

/// Ignores contact bounce after a press.
const DEBOUNCE: Duration = Duration::from_millis(50);

/// Turns button presses into start and stop requests.
#[embassy_executor::task]
pub async fn run(mut button: ExtiInput<'static>) -> ! {
    loop {
        button.wait_for_rising_edge().await;
        Timer::after(DEBOUNCE).await;
        if button.is_low() {
            continue;
        }

        if status::is_running() {
            defmt::info!("button: stop requested");
            STOP.signal(());
        } else {
            defmt::info!("button: start requested");
            START.signal(());
        }

        button.wait_for_falling_edge().await;
        Timer::after(DEBOUNCE).await;
    }
}

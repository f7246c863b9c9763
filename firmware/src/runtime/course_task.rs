use course_core::config::CourseConfig;
use course_core::control::{AbortReason, ControlLoop, CourseResult, TickReport};
use course_core::telemetry::EventId;
use embassy_futures::select::{Either, select};
use embassy_time::Ticker;

use super::{START, STOP};
use crate::hw::board::{BoardActuators, BoardSensors, EmbassyDelay};
use crate::hw::to_embassy;
use crate::{status, telemetry};

type BoardLoop = ControlLoop<BoardSensors<'static>, BoardActuators<'static>, EmbassyDelay>;

/// Waits for the start button, runs one course, and repeats.
#[embassy_executor::task]
pub async fn run(
    config: &'static CourseConfig,
    mut sensors: BoardSensors<'static>,
    mut actuators: BoardActuators<'static>,
) -> ! {
    loop {
        START.wait().await;
        STOP.reset();

        let mut control = match ControlLoop::new(config.clone(), sensors, actuators, EmbassyDelay) {
            Ok(control) => control,
            Err(error) => {
                defmt::error!("course: configuration rejected: {}", defmt::Display2Format(&error));
                park().await
            }
        };

        status::begin_course();
        let result = run_course(&mut control, config).await;
        status::record_result(&result);
        telemetry::log_result(&result, &status::snapshot());

        (sensors, actuators, _) = control.into_parts();
    }
}

/// Ticks at the configured rate until the course ends or the button stops it.
async fn run_course(control: &mut BoardLoop, config: &CourseConfig) -> CourseResult {
    if let Some(result) = control.prepare_actuators() {
        return result;
    }

    let mut cursor: EventId = 0;
    let mut ticker = Ticker::every(to_embassy(config.tick_period));
    loop {
        if let Either::Second(()) = select(ticker.next(), STOP.wait()).await {
            let result = control.abort(AbortReason::StopRequested);
            telemetry::drain(control.telemetry(), &mut cursor, control.orchestrator().counters());
            return result;
        }

        let outcome = control.tick();
        let counters = control.orchestrator().counters();
        let result = match outcome {
            Ok(TickReport::Advanced(summary)) => {
                status::record_tick(&summary, counters);
                None
            }
            Ok(TickReport::SensorFault(fault)) => {
                telemetry::log_sensor_fault(control.ticks(), fault);
                None
            }
            Ok(TickReport::Finished(summary)) => {
                status::record_tick(&summary, counters);
                Some(control.finish())
            }
            Err(error) => Some(control.abort(AbortReason::Fault(error))),
        };
        telemetry::drain(control.telemetry(), &mut cursor, counters);

        if let Some(result) = result {
            return result;
        }
    }
}

/// Leaves the robot idle when it cannot run a course at all.
async fn park() -> ! {
    loop {
        core::future::pending::<()>().await;
    }
}

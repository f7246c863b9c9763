//! Logging drain for the course telemetry ring.
//!
//! The control loop keeps its own history ring; after every tick the course
//! task hands it to [`drain`], which mirrors new records to defmt on the MCU
//! and to stdout on the host. A cursor remembers what was already printed.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use course_core::control::CourseResult;
use course_core::orchestrator::TaskCounters;
use course_core::sensors::SensorFault;
use course_core::telemetry::{EventId, TelemetryEvent, TelemetryRecord, TelemetryRecorder};

use crate::status::StatusSnapshot;

/// Emits every record newer than `cursor` and advances it. Returns the number emitted.
///
/// Task transitions are logged together with the target counters.
pub fn drain(recorder: &TelemetryRecorder, cursor: &mut EventId, counters: TaskCounters) -> usize {
    if let Some(oldest) = recorder.oldest_first().next()
        && oldest.id > *cursor
    {
        emit_dropped(oldest.id - *cursor);
    }

    let mut emitted = 0;
    for record in recorder.since(*cursor) {
        match record.event {
            TelemetryEvent::TaskTransition { .. } => emit_task_record(record, counters),
            _ => emit_record(record),
        }
        emitted += 1;
    }
    *cursor = recorder.next_id();
    emitted
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord) {
    if record.event.is_terminal() || matches!(record.event, TelemetryEvent::ShutdownFailed(_)) {
        defmt::warn!(
            "telemetry:{=u16:#06x} {}",
            record.event.code(),
            defmt::Display2Format(record)
        );
    } else {
        defmt::info!(
            "telemetry:{=u16:#06x} {}",
            record.event.code(),
            defmt::Display2Format(record)
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord) {
    println!("telemetry:{:#06x} {}", record.event.code(), record);
}

#[cfg(target_os = "none")]
fn emit_task_record(record: &TelemetryRecord, counters: TaskCounters) {
    defmt::info!(
        "telemetry:{=u16:#06x} {} primary={=u8} secondary={=u8}",
        record.event.code(),
        defmt::Display2Format(record),
        counters.primary_targets_handled,
        counters.secondary_targets_handled
    );
}

#[cfg(not(target_os = "none"))]
fn emit_task_record(record: &TelemetryRecord, counters: TaskCounters) {
    println!(
        "telemetry:{:#06x} {} primary={} secondary={}",
        record.event.code(),
        record,
        counters.primary_targets_handled,
        counters.secondary_targets_handled
    );
}

#[cfg(target_os = "none")]
fn emit_dropped(count: EventId) {
    defmt::warn!("telemetry: {=u32} events overwritten before drain", count);
}

#[cfg(not(target_os = "none"))]
fn emit_dropped(count: EventId) {
    println!("telemetry: {count} events overwritten before drain");
}

/// Logs a recovered sensor fault.
#[cfg(target_os = "none")]
pub fn log_sensor_fault(tick: u32, fault: SensorFault) {
    defmt::warn!("course: t{=u32} {}", tick, defmt::Display2Format(&fault));
}

#[cfg(not(target_os = "none"))]
pub fn log_sensor_fault(tick: u32, fault: SensorFault) {
    println!("course: t{tick} {fault}");
}

/// Logs the end of a course with the final progress.
#[cfg(target_os = "none")]
pub fn log_result(result: &CourseResult, status: &StatusSnapshot) {
    match result {
        CourseResult::Finished => defmt::info!(
            "course: finished at t{=u32} primary={=u8} secondary={=u8}",
            status.tick,
            status.primary_handled,
            status.secondary_handled
        ),
        CourseResult::Aborted(_) => defmt::error!(
            "course: {} at t{=u32} base={} task={}",
            defmt::Display2Format(result),
            status.tick,
            defmt::Display2Format(&status.base),
            defmt::Display2Format(&status.task)
        ),
    }
}

#[cfg(not(target_os = "none"))]
pub fn log_result(result: &CourseResult, status: &StatusSnapshot) {
    println!(
        "course: {result} at t{} base={} task={} primary={} secondary={}",
        status.tick, status.base, status.task, status.primary_handled, status.secondary_handled
    );
}

//! Course telemetry catalog and the fixed-size history ring.
//!
//! The control loop records every state change, sensor fault and completed
//! task script here instead of logging directly. Firmware drains the ring into
//! defmt, and the emulator prints it into transcripts. Events carry a compact
//! numeric code so they can be logged without string formatting on the MCU.

use core::fmt;

use heapless::HistoryBuf;

use crate::base::BaseState;
use crate::control::AbortReason;
use crate::orchestrator::TaskState;
use crate::sensors::SensorFault;
use crate::sequences::{ActuatorError, ScriptReport};

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events produced by the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEvent {
    BaseTransition { from: BaseState, to: BaseState },
    TaskTransition { from: TaskState, to: TaskState },
    SensorFault(SensorFault),
    ScriptCompleted(ScriptReport),
    /// A subsystem did not acknowledge its stop while the course was being aborted.
    ShutdownFailed(ActuatorError),
    CourseFinished,
    CourseAborted(AbortReason),
}

impl TelemetryEvent {
    const BASE_TRANSITION_CODE: u16 = 0x0001;
    const TASK_TRANSITION_CODE: u16 = 0x0002;
    const SENSOR_FAULT_CODE: u16 = 0x0010;
    const SCRIPT_COMPLETED_CODE: u16 = 0x0020;
    const COURSE_FINISHED_CODE: u16 = 0x0030;
    const COURSE_ABORTED_CODE: u16 = 0x0031;
    const SHUTDOWN_FAILED_CODE: u16 = 0x0032;

    /// Encodes the event kind into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            TelemetryEvent::BaseTransition { .. } => Self::BASE_TRANSITION_CODE,
            TelemetryEvent::TaskTransition { .. } => Self::TASK_TRANSITION_CODE,
            TelemetryEvent::SensorFault(_) => Self::SENSOR_FAULT_CODE,
            TelemetryEvent::ScriptCompleted(_) => Self::SCRIPT_COMPLETED_CODE,
            TelemetryEvent::CourseFinished => Self::COURSE_FINISHED_CODE,
            TelemetryEvent::CourseAborted(_) => Self::COURSE_ABORTED_CODE,
            TelemetryEvent::ShutdownFailed(_) => Self::SHUTDOWN_FAILED_CODE,
        }
    }

    /// `true` for events that end a course.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            TelemetryEvent::CourseFinished | TelemetryEvent::CourseAborted(_)
        )
    }
}

impl fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEvent::BaseTransition { from, to } => write!(f, "base {from} -> {to}"),
            TelemetryEvent::TaskTransition { from, to } => write!(f, "task {from} -> {to}"),
            TelemetryEvent::SensorFault(fault) => write!(f, "sensor-fault {fault}"),
            TelemetryEvent::ScriptCompleted(report) => {
                write!(f, "script {} done in {} steps", report.kind, report.edges)
            }
            TelemetryEvent::CourseFinished => f.write_str("course-finished"),
            TelemetryEvent::CourseAborted(reason) => write!(f, "course-aborted {reason}"),
            TelemetryEvent::ShutdownFailed(error) => write!(f, "shutdown-failed {error}"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    /// Control-loop tick during which the event happened.
    pub tick: u32,
    pub event: TelemetryEvent,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} t{} {}", self.id, self.tick, self.event)
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
///
/// Old records are overwritten once the ring is full; ids keep increasing so
/// readers can resume from a cursor with [`TelemetryRecorder::since`].
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Records an event and returns its identifier.
    pub fn record(&mut self, event: TelemetryEvent, tick: u32) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, tick, event });
        id
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `cursor`, oldest first.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.oldest_first().filter(move |record| record.id >= cursor)
    }

    /// Identifier the next recorded event will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Drops all stored records. Identifiers keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Copies the stored history into a vector, oldest first.
    #[cfg(feature = "alloc")]
    #[must_use]
    pub fn to_vec(&self) -> alloc::vec::Vec<TelemetryRecord> {
        self.oldest_first().copied().collect()
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorChannel;

    #[test]
    fn records_are_numbered_in_order() {
        let mut recorder: TelemetryRecorder<4> = TelemetryRecorder::new();
        let first = recorder.record(TelemetryEvent::CourseFinished, 1);
        let second = recorder.record(
            TelemetryEvent::SensorFault(SensorFault::Distance(SensorChannel::Top)),
            2,
        );
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.latest().map(|record| record.tick), Some(2));
    }

    #[test]
    fn ring_overwrites_oldest_and_cursor_resumes() {
        let mut recorder: TelemetryRecorder<3> = TelemetryRecorder::new();
        for tick in 0..5 {
            recorder.record(
                TelemetryEvent::BaseTransition {
                    from: BaseState::Start,
                    to: BaseState::Cruise,
                },
                tick,
            );
        }
        let ids: heapless::Vec<EventId, 4> =
            recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[2, 3, 4]);

        let tail: heapless::Vec<EventId, 4> = recorder.since(4).map(|record| record.id).collect();
        assert_eq!(tail.as_slice(), &[4]);
        assert_eq!(recorder.next_id(), 5);
    }

    #[test]
    fn event_codes_are_distinct() {
        let events = [
            TelemetryEvent::BaseTransition {
                from: BaseState::Start,
                to: BaseState::Cruise,
            },
            TelemetryEvent::TaskTransition {
                from: TaskState::AwaitFirstTarget,
                to: TaskState::ApproachFirstTarget,
            },
            TelemetryEvent::SensorFault(SensorFault::LineArray),
            TelemetryEvent::ShutdownFailed(ActuatorError::Lift),
            TelemetryEvent::CourseFinished,
            TelemetryEvent::CourseAborted(AbortReason::StopRequested),
        ];
        for (index, event) in events.iter().enumerate() {
            for other in &events[index + 1..] {
                assert_ne!(event.code(), other.code());
            }
        }
        assert!(TelemetryEvent::CourseFinished.is_terminal());
    }
}

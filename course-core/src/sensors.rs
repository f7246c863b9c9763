//! Sensor model shared by firmware and host targets.
//!
//! The control loop reads five proximity channels and one line-array position
//! per tick through [`SensorPort`]. Port implementations own the hardware and
//! any smoothing; the core only sees distances and aggregate line magnitudes.

use core::fmt;

use heapless::HistoryBuf;

/// Proximity channels polled every tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorChannel {
    FrontLeft,
    FrontMiddle,
    FrontRight,
    Bottom,
    Top,
}

/// Every proximity channel in polling order. Position `i` holds the channel
/// whose [`SensorChannel::as_index`] is `i`, so ports can wire tables by it.
pub const ALL_CHANNELS: [SensorChannel; 5] = [
    SensorChannel::FrontLeft,
    SensorChannel::FrontMiddle,
    SensorChannel::FrontRight,
    SensorChannel::Bottom,
    SensorChannel::Top,
];

impl SensorChannel {
    /// Deterministic index for per-channel tables.
    pub const fn as_index(self) -> usize {
        match self {
            SensorChannel::FrontLeft => 0,
            SensorChannel::FrontMiddle => 1,
            SensorChannel::FrontRight => 2,
            SensorChannel::Bottom => 3,
            SensorChannel::Top => 4,
        }
    }

    /// Attempts to construct a [`SensorChannel`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(SensorChannel::FrontLeft),
            1 => Some(SensorChannel::FrontMiddle),
            2 => Some(SensorChannel::FrontRight),
            3 => Some(SensorChannel::Bottom),
            4 => Some(SensorChannel::Top),
            _ => None,
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SensorChannel::FrontLeft => "front-left",
            SensorChannel::FrontMiddle => "front-middle",
            SensorChannel::FrontRight => "front-right",
            SensorChannel::Bottom => "bottom",
            SensorChannel::Top => "top",
        };
        f.write_str(label)
    }
}

/// Read failures reported by a [`SensorPort`].
///
/// A fault is always distinct from a valid zero-distance reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorFault {
    /// The distance channel did not answer or returned garbage.
    Distance(SensorChannel),
    /// The line array could not be read.
    LineArray,
    /// Re-initialization of the sensor bus failed.
    Reinitialize,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorFault::Distance(channel) => write!(f, "distance read failed on {channel}"),
            SensorFault::LineArray => f.write_str("line array read failed"),
            SensorFault::Reinitialize => f.write_str("sensor re-initialization failed"),
        }
    }
}

/// Aggregate line-array reading: weighted magnitude on each side of centre.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LinePosition {
    pub left: f32,
    pub right: f32,
}

impl LinePosition {
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Signed offset; positive means the line sits under the right half.
    #[must_use]
    pub fn offset(&self) -> f32 {
        self.right - self.left
    }

    /// `true` when both halves report any reading.
    #[must_use]
    pub fn both_sides_seen(&self) -> bool {
        self.left != 0.0 && self.right != 0.0
    }
}

/// One tick's worth of sensor data. Immutable once built.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SensorSnapshot {
    pub front_left: f32,
    pub front_middle: f32,
    pub front_right: f32,
    pub bottom: f32,
    pub top: f32,
    pub line: LinePosition,
}

impl SensorSnapshot {
    /// Polls every channel on `port`, stopping at the first fault.
    pub fn read<P>(port: &mut P) -> Result<Self, SensorFault>
    where
        P: SensorPort + ?Sized,
    {
        let mut distances = [0.0_f32; 5];
        for channel in ALL_CHANNELS {
            distances[channel.as_index()] = port.read_distance(channel)?;
        }
        let line = port.read_line_position()?;

        Ok(Self {
            front_left: distances[SensorChannel::FrontLeft.as_index()],
            front_middle: distances[SensorChannel::FrontMiddle.as_index()],
            front_right: distances[SensorChannel::FrontRight.as_index()],
            bottom: distances[SensorChannel::Bottom.as_index()],
            top: distances[SensorChannel::Top.as_index()],
            line,
        })
    }

    /// Reading for a single channel.
    #[must_use]
    pub fn distance(&self, channel: SensorChannel) -> f32 {
        match channel {
            SensorChannel::FrontLeft => self.front_left,
            SensorChannel::FrontMiddle => self.front_middle,
            SensorChannel::FrontRight => self.front_right,
            SensorChannel::Bottom => self.bottom,
            SensorChannel::Top => self.top,
        }
    }
}

/// Hardware boundary for every sensor the control loop consumes.
pub trait SensorPort {
    /// Reads one proximity channel.
    fn read_distance(&mut self, channel: SensorChannel) -> Result<f32, SensorFault>;

    /// Reads the line array and reduces it to left/right magnitudes.
    fn read_line_position(&mut self) -> Result<LinePosition, SensorFault>;

    /// Resets the sensor bus after a read fault.
    fn reinitialize(&mut self) -> Result<(), SensorFault>;
}

/// Decoder for the eight-element reflectance array.
pub struct LineArray;

impl LineArray {
    /// Number of reflectance elements on the array.
    pub const ELEMENTS: usize = 8;
    /// Weight of each element counted outward from the centre.
    pub const WEIGHTS: [u8; 4] = [1, 2, 3, 4];
    /// Magnitude reported by one half when all of its elements see the line.
    pub const FULL_SCALE: f32 = 10.0;

    /// Reduces raw element bits to weighted magnitudes.
    ///
    /// Bit `n` is element `n`, counted left to right. Elements 3..=0 feed the
    /// left magnitude and 4..=7 feed the right, each weighted 1..=4 from the
    /// centre outward.
    #[must_use]
    pub fn magnitudes(bits: u8) -> LinePosition {
        let mut left = 0_u8;
        let mut right = 0_u8;
        for (offset, weight) in Self::WEIGHTS.iter().enumerate() {
            if bits & (1 << (3 - offset)) != 0 {
                left += weight;
            }
            if bits & (1 << (4 + offset)) != 0 {
                right += weight;
            }
        }
        LinePosition::new(f32::from(left), f32::from(right))
    }
}

/// Running mean over the last `N` non-zero distance readings.
///
/// Zero readings are treated as dropouts and discarded; an empty filter
/// reports zero.
pub struct RangeFilter<const N: usize> {
    window: HistoryBuf<f32, N>,
}

impl<const N: usize> RangeFilter<N> {
    pub const fn new() -> Self {
        Self {
            window: HistoryBuf::new(),
        }
    }

    /// Adds a raw reading and returns the smoothed distance.
    pub fn push(&mut self, reading: f32) -> f32 {
        if reading != 0.0 {
            self.window.write(reading);
        }
        self.value()
    }

    /// Current smoothed distance.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.window.iter().sum();
        sum / self.window.len() as f32
    }

    /// Drops every buffered reading.
    pub fn clear(&mut self) {
        self.window.clear();
    }
}

impl<const N: usize> Default for RangeFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_array_weights_each_half_from_centre() {
        assert_eq!(LineArray::magnitudes(0), LinePosition::new(0.0, 0.0));
        assert_eq!(LineArray::magnitudes(0xFF), LinePosition::new(10.0, 10.0));
        // Element 3 is the innermost left element, element 0 the outermost.
        assert_eq!(LineArray::magnitudes(0b0000_1000), LinePosition::new(1.0, 0.0));
        assert_eq!(LineArray::magnitudes(0b0000_0001), LinePosition::new(4.0, 0.0));
        // Element 4 is the innermost right element, element 7 the outermost.
        assert_eq!(LineArray::magnitudes(0b0001_0000), LinePosition::new(0.0, 1.0));
        assert_eq!(LineArray::magnitudes(0b1000_0000), LinePosition::new(0.0, 4.0));
    }

    #[test]
    fn range_filter_ignores_dropouts() {
        let mut filter: RangeFilter<5> = RangeFilter::new();
        assert_eq!(filter.value(), 0.0);
        assert_eq!(filter.push(0.0), 0.0);
        assert_eq!(filter.push(10.0), 10.0);
        assert_eq!(filter.push(0.0), 10.0);
        assert_eq!(filter.push(20.0), 15.0);
    }

    #[test]
    fn range_filter_keeps_only_recent_window() {
        let mut filter: RangeFilter<3> = RangeFilter::new();
        for reading in [100.0, 1.0, 2.0, 3.0] {
            filter.push(reading);
        }
        assert_eq!(filter.value(), 2.0);
        filter.clear();
        assert_eq!(filter.value(), 0.0);
    }

    #[test]
    fn channel_index_round_trips() {
        for channel in ALL_CHANNELS {
            assert_eq!(SensorChannel::from_index(channel.as_index()), Some(channel));
        }
        assert_eq!(SensorChannel::from_index(5), None);
    }

    #[test]
    fn polling_order_matches_table_index() {
        for (slot, channel) in ALL_CHANNELS.into_iter().enumerate() {
            assert_eq!(channel.as_index(), slot, "{channel} polled out of place");
        }
    }
}

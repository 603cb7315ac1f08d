#[macro_use]
extern crate num_derive;
extern crate byteorder;

pub mod acquisition;
pub mod config;
pub mod correlation;
pub mod errors;
pub mod export;
pub mod parsers;
pub mod run;

use num_traits::FromPrimitive;

/// Detector line a click arrived on.
///
/// By convention channel 0 is the herald, channel 1 the signal and channel 2 an
/// auxiliary detector.
#[derive(FromPrimitive, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    Herald = 0,
    Signal = 1,
    Auxiliary = 2,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Herald, Channel::Signal, Channel::Auxiliary];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Channel for a raw detector number as reported by the hardware or a tag file.
    pub fn from_raw(raw: i32) -> Result<Self, errors::Error> {
        FromPrimitive::from_i32(raw).ok_or_else(|| {
            errors::Error::AcquisitionError(format!("Unknown detector channel {}", raw))
        })
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Ch{}", self.index())
    }
}

/// A source of decoded clicks read from a raw record stream.
pub trait TagStream {
    type RecordSize;
    fn parse_record(&mut self, raw_record: Self::RecordSize) -> Option<TimeTag>;
    fn time_resolution(&self) -> f64;
}

/// A single detection event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimeTag {
    pub channel: Channel,
    pub timestamp_ps: u64,
}

impl TimeTag {
    pub fn new(channel: Channel, timestamp_ps: u64) -> Self {
        Self {
            channel,
            timestamp_ps,
        }
    }
}

pub(crate) trait Click {
    fn channel(&self) -> &Channel;
    fn tof(&self) -> &u64;
}

impl Click for TimeTag {
    #[inline]
    fn channel(&self) -> &Channel {&self.channel}
    #[inline]
    fn tof(&self) -> &u64 {&self.timestamp_ps}
}

/// One acquisition worth of clicks, in acquisition order.
///
/// Timestamps are in picoseconds and measured from the start of the acquisition,
/// so the last timestamp doubles as the length of the acquisition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeTagBatch {
    tags: Vec<TimeTag>,
}

impl TimeTagBatch {
    pub fn new(tags: Vec<TimeTag>) -> Self {
        Self { tags }
    }

    /// Build a batch from parallel channel/timestamp columns.
    pub fn from_columns(channels: &[i32], timestamps_ps: &[u64]) -> Result<Self, errors::Error> {
        if channels.len() != timestamps_ps.len() {
            return Err(errors::Error::AcquisitionError(format!(
                "Channel and timestamp columns differ in length ({} vs {})",
                channels.len(),
                timestamps_ps.len()
            )));
        }
        let tags = channels
            .iter()
            .zip(timestamps_ps)
            .map(|(&ch, &t)| Ok(TimeTag::new(Channel::from_raw(ch)?, t)))
            .collect::<Result<Vec<_>, errors::Error>>()?;
        Ok(Self { tags })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[TimeTag] {
        &self.tags
    }

    pub fn last_timestamp_ps(&self) -> u64 {
        self.tags.last().map(|t| *t.tof()).unwrap_or(0)
    }

    /// Acquisition length in seconds, taken from the last click.
    pub fn integration_time_s(&self) -> f64 {
        self.last_timestamp_ps() as f64 / 1e12
    }

    /// Timestamps of the clicks registered on `channel`.
    pub fn timestamps_on(&self, channel: Channel) -> Vec<u64> {
        self.tags
            .iter()
            .filter(|t| *t.channel() == channel)
            .map(|t| *t.tof())
            .collect()
    }

    pub fn channel_counts(&self) -> ChannelCounts {
        let mut counts = ChannelCounts::default();
        for tag in &self.tags {
            counts.0[tag.channel().index()] += 1;
        }
        counts
    }
}

/// Click totals per detector channel.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ChannelCounts(pub [u64; 3]);

impl ChannelCounts {
    #[inline]
    pub fn get(&self, channel: Channel) -> u64 {
        self.0[channel.index()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

impl std::ops::AddAssign for ChannelCounts {
    fn add_assign(&mut self, other: Self) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }
}

use std::iter::Peekable;

use tracing::debug;

use crate::errors::Error;
use crate::parsers::tags::TagFile;
use crate::{TimeTag, TimeTagBatch};

/// Front end that hands out batches of clicks.
pub trait Acquisition {
    /// Collect clicks until either `max_counts` clicks have been seen or
    /// `max_duration_ms` milliseconds have passed. Timestamps of the returned
    /// batch start from the beginning of the acquisition.
    fn acquire(&mut self, max_counts: u64, max_duration_ms: u64) -> Result<TimeTagBatch, Error>;

    /// True once the source will not produce any more clicks.
    fn exhausted(&mut self) -> bool {
        false
    }
}

/// Replays recorded clicks as if they were coming from the time tagger.
///
/// The recording is cut into consecutive acquisition windows. A window ends
/// after `max_duration_ms` or at the click that fills the count budget,
/// whichever comes first, and the next window starts where it ended.
pub struct ReplaySource<I: Iterator<Item = TimeTag>> {
    clicks: Peekable<I>,
    origin_ps: u64,
}

impl<I: Iterator<Item = TimeTag>> ReplaySource<I> {
    pub fn new(clicks: I) -> Self {
        Self {
            clicks: clicks.peekable(),
            origin_ps: 0,
        }
    }
}

impl ReplaySource<Box<dyn Iterator<Item = TimeTag> + Send>> {
    pub fn from_file(file: &TagFile) -> Result<Self, Error> {
        Ok(Self::new(file.clicks()?))
    }
}

impl<I: Iterator<Item = TimeTag>> Acquisition for ReplaySource<I> {
    fn acquire(&mut self, max_counts: u64, max_duration_ms: u64) -> Result<TimeTagBatch, Error> {
        if max_counts == 0 || max_duration_ms == 0 {
            return Err(Error::AcquisitionError(String::from(
                "Acquisition needs a positive count budget and duration",
            )));
        }
        let window_end = self
            .origin_ps
            .saturating_add(max_duration_ms.saturating_mul(1_000_000_000));

        let mut tags = Vec::new();
        let mut budget_hit = false;
        while let Some(next) = self.clicks.peek() {
            if next.timestamp_ps >= window_end {
                break;
            }
            if next.timestamp_ps < self.origin_ps {
                return Err(Error::AcquisitionError(format!(
                    "Recorded clicks go back in time ({} ps before {} ps)",
                    next.timestamp_ps, self.origin_ps
                )));
            }
            tags.push(TimeTag::new(next.channel, next.timestamp_ps - self.origin_ps));
            self.clicks.next();
            if tags.len() as u64 >= max_counts {
                budget_hit = true;
                break;
            }
        }

        self.origin_ps = match (budget_hit, tags.last()) {
            (true, Some(last)) => self.origin_ps + last.timestamp_ps,
            _ => window_end,
        };
        debug!(clicks = tags.len(), budget_hit, "replayed acquisition");
        Ok(TimeTagBatch::new(tags))
    }

    fn exhausted(&mut self) -> bool {
        self.clicks.peek().is_none()
    }
}

use crate::correlation::histogram::CorrelationHistogram;
use crate::correlation::Mode;
use crate::errors::Error;
use crate::{ChannelCounts, TimeTagBatch};

/// Per batch totals that are carried into the running state.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BatchStats {
    pub integration_time_s: f64,
    pub channel_counts: ChannelCounts,
}

impl BatchStats {
    /// Totals for `batch`. Auto-correlation only counts clicks on its own channel.
    pub fn from_batch(batch: &TimeTagBatch, mode: Mode) -> Self {
        let mut channel_counts = batch.channel_counts();
        if let Mode::AutoCorrelation(channel) = mode {
            let own = channel_counts.get(channel);
            channel_counts = ChannelCounts::default();
            channel_counts.0[channel.index()] = own;
        }
        Self {
            integration_time_s: batch.integration_time_s(),
            channel_counts,
        }
    }
}

/// Histogram and totals accumulated over the acquisitions of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatorState {
    pub histogram: Option<CorrelationHistogram>,
    pub integration_time_s: f64,
    pub channel_counts: ChannelCounts,
}

impl AccumulatorState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold a freshly built histogram into the state.
    ///
    /// Without `cumulative` the state is replaced by the new histogram and the
    /// totals of this batch alone. With `cumulative` counts are summed bin by bin
    /// and totals are added. Summing histograms with different bins is refused
    /// with `InvalidState` and leaves the state untouched.
    pub fn merge(
        &mut self,
        histogram: CorrelationHistogram,
        stats: BatchStats,
        cumulative: bool,
    ) -> Result<(), Error> {
        if !cumulative {
            self.histogram = Some(histogram);
            self.integration_time_s = stats.integration_time_s;
            self.channel_counts = stats.channel_counts;
            return Ok(());
        }

        match &mut self.histogram {
            Some(acc) => {
                if !acc.same_shape(&histogram) {
                    return Err(Error::InvalidState(format!(
                        "Cannot add a {} bin histogram to a {} bin accumulation",
                        histogram.bin_count(),
                        acc.bin_count()
                    )));
                }
                for (a, b) in acc.counts.iter_mut().zip(histogram.counts.iter()) {
                    *a += b;
                }
            }
            // Adding into a zeroed accumulation is just the new histogram.
            None => self.histogram = Some(histogram),
        }
        self.integration_time_s += stats.integration_time_s;
        self.channel_counts += stats.channel_counts;
        Ok(())
    }
}

use tracing::debug;

use crate::correlation::binning::BinningSpec;
use crate::correlation::Mode;
use crate::{Channel, Click, TimeTag, TimeTagBatch};

/// Delay histogram over a fixed binning.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationHistogram {
    pub counts: Vec<u64>,
    pub bin_centers_ps: Vec<f64>,
}

impl CorrelationHistogram {
    /// All-zero histogram laid out on `spec`.
    pub fn zeros(spec: &BinningSpec) -> Self {
        Self {
            counts: vec![0; spec.bin_count],
            bin_centers_ps: spec.bin_centers(),
        }
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// True when both histograms share the same bins.
    pub fn same_shape(&self, other: &CorrelationHistogram) -> bool {
        self.counts.len() == other.counts.len() && self.bin_centers_ps == other.bin_centers_ps
    }
}

pub(crate) struct HistogramBuilder {
    spec: BinningSpec,
    n_lags: usize,
}

impl HistogramBuilder {
    pub(crate) fn init(spec: BinningSpec, n_lags: usize) -> Self {
        Self { spec, n_lags }
    }

    pub(crate) fn build(&self, batch: &TimeTagBatch, mode: Mode) -> CorrelationHistogram {
        let mut hist = CorrelationHistogram::zeros(&self.spec);
        match mode {
            Mode::CrossCorrelation => self.cross(batch.tags(), &mut hist.counts),
            Mode::HeraldedCrossCorrelation => self.heralded(batch.tags(), &mut hist.counts),
            Mode::AutoCorrelation(channel) => {
                self.auto(&batch.timestamps_on(channel), &mut hist.counts)
            }
        }
        hist
    }

    #[inline(always)]
    fn accumulate(&self, start: u64, stop: u64, out_hist: &mut [u64]) -> bool {
        // Out of order clicks give negative delays, which sit below the range.
        let delta = stop.wrapping_sub(start) as i64 as f64;
        match self.spec.bin_index(delta) {
            Some(idx) => {
                out_hist[idx] += 1;
                true
            }
            None => false,
        }
    }

    /// Herald (ch0) click followed `i` clicks later by a signal (ch1) click, for
    /// every lag order `i` up to the lag depth.
    fn cross(&self, tags: &[TimeTag], out_hist: &mut [u64]) {
        for lag in 1..=self.n_lags {
            if tags.len() <= lag {
                break;
            }
            let mut in_range = 0;
            for (start, stop) in tags.iter().zip(&tags[lag..]) {
                if *start.channel() == Channel::Herald && *stop.channel() == Channel::Signal {
                    in_range += self.accumulate(*start.tof(), *stop.tof(), out_hist) as u64;
                }
            }
            debug!(lag, coincidences = in_range, "cross correlation lag");
        }
    }

    /// Signal (ch1) to auxiliary (ch2) pairs gated by a herald.
    ///
    /// A pair `(k, k + i)` counts only when one of the `n_lags` clicks before the
    /// signal click is a herald, and that herald precedes the signal by no more
    /// than the histogram range.
    fn heralded(&self, tags: &[TimeTag], out_hist: &mut [u64]) {
        let heralded_signal: Vec<bool> = (0..tags.len())
            .map(|k| {
                if *tags[k].channel() != Channel::Signal {
                    return false;
                }
                let t_signal = *tags[k].tof();
                tags[k.saturating_sub(self.n_lags)..k].iter().any(|h| {
                    *h.channel() == Channel::Herald
                        && (t_signal.wrapping_sub(*h.tof()) as i64 as f64) <= self.spec.range_end_ps
                })
            })
            .collect();

        for lag in 1..=self.n_lags {
            if tags.len() <= lag {
                break;
            }
            let mut in_range = 0;
            for (k, (start, stop)) in tags.iter().zip(&tags[lag..]).enumerate() {
                if heralded_signal[k] && *stop.channel() == Channel::Auxiliary {
                    in_range += self.accumulate(*start.tof(), *stop.tof(), out_hist) as u64;
                }
            }
            debug!(lag, coincidences = in_range, "heralded cross correlation lag");
        }
    }

    /// Delays between a click and the `i`-th following click on the same channel.
    fn auto(&self, times: &[u64], out_hist: &mut [u64]) {
        for lag in 1..=self.n_lags {
            if times.len() <= lag {
                break;
            }
            let mut in_range = 0;
            for (&start, &stop) in times.iter().zip(&times[lag..]) {
                in_range += self.accumulate(start, stop, out_hist) as u64;
            }
            debug!(lag, coincidences = in_range, "auto correlation lag");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(max_delay_ps: f64, n_lags: usize) -> HistogramBuilder {
        HistogramBuilder::init(BinningSpec::new(max_delay_ps).unwrap(), n_lags)
    }

    fn batch(channels: &[i32], times: &[u64]) -> TimeTagBatch {
        TimeTagBatch::from_columns(channels, times).unwrap()
    }

    #[test]
    fn cross_correlation_two_close_pairs() {
        let b = batch(&[0, 1, 0, 1], &[0, 10, 1000, 1015]);
        let hist = builder(40_000.0, 1).build(&b, Mode::CrossCorrelation);
        assert_eq!(hist.bin_count(), 1482);
        assert_eq!(hist.total(), 2);
        // first bin spans -13.49..13.49 ps
        assert_eq!(hist.counts[0], 1);
        assert_eq!(hist.counts[1], 1);
    }

    #[test]
    fn cross_correlation_sums_lag_orders() {
        // lag 1: (0->10), (1000->1015); lag 2: none (0->0 is herald->herald);
        // lag 3: (0 -> 1015)
        let b = batch(&[0, 1, 0, 1], &[0, 10, 1000, 1015]);
        let hist = builder(40_000.0, 3).build(&b, Mode::CrossCorrelation);
        assert_eq!(hist.total(), 3);
        let spec = BinningSpec::new(40_000.0).unwrap();
        assert_eq!(hist.counts[spec.bin_index(1015.0).unwrap()], 1);
    }

    #[test]
    fn cross_correlation_ignores_signal_before_herald() {
        let b = batch(&[1, 0, 1, 1], &[0, 100, 200, 300]);
        let hist = builder(40_000.0, 1).build(&b, Mode::CrossCorrelation);
        assert_eq!(hist.total(), 1);
    }

    #[test]
    fn delays_keep_picosecond_precision_at_large_timestamps() {
        // f64 spacing at 2^60 ps is 256 ps
        let t0 = 1u64 << 60;
        let b = batch(&[0, 1, 0, 1], &[t0, t0 + 20, t0 + 1_000, t0 + 1_300]);
        let hist = builder(1_000.0, 1).build(&b, Mode::CrossCorrelation);
        let spec = BinningSpec::new(1_000.0).unwrap();
        assert_eq!(hist.total(), 2);
        assert_eq!(hist.counts[spec.bin_index(20.0).unwrap()], 1);
        assert_eq!(hist.counts[spec.bin_index(300.0).unwrap()], 1);
    }

    #[test]
    fn delays_beyond_window_are_dropped() {
        let b = batch(&[0, 1], &[0, 50_000]);
        let hist = builder(40_000.0, 1).build(&b, Mode::CrossCorrelation);
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn auto_correlation_uses_only_selected_channel() {
        let b = batch(&[2, 0, 2, 2], &[0, 5, 100, 400]);
        let hist = builder(1_000.0, 2).build(&b, Mode::AutoCorrelation(Channel::Auxiliary));
        // lag 1: 100, 300; lag 2: 400
        assert_eq!(hist.total(), 3);
        let spec = BinningSpec::new(1_000.0).unwrap();
        assert_eq!(hist.counts[spec.bin_index(100.0).unwrap()], 1);
        assert_eq!(hist.counts[spec.bin_index(300.0).unwrap()], 1);
        assert_eq!(hist.counts[spec.bin_index(400.0).unwrap()], 1);
    }

    #[test]
    fn too_few_events_contribute_nothing() {
        let b = batch(&[1], &[10]);
        let hist = builder(1_000.0, 4).build(&b, Mode::AutoCorrelation(Channel::Signal));
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn empty_batch_gives_zero_histogram() {
        let b = TimeTagBatch::default();
        for mode in &[
            Mode::CrossCorrelation,
            Mode::HeraldedCrossCorrelation,
            Mode::AutoCorrelation(Channel::Herald),
        ] {
            let hist = builder(1_000.0, 2).build(&b, *mode);
            assert_eq!(hist.bin_count(), 37);
            assert_eq!(hist.total(), 0);
        }
    }

    #[test]
    fn heralded_requires_a_recent_herald() {
        // herald, signal, aux -> counted; signal, aux without herald -> not counted
        let b = batch(&[0, 1, 2, 1, 2], &[0, 100, 150, 5_000, 5_040]);
        let hist = builder(1_000.0, 1).build(&b, Mode::HeraldedCrossCorrelation);
        assert_eq!(hist.total(), 1);
        let spec = BinningSpec::new(1_000.0).unwrap();
        assert_eq!(hist.counts[spec.bin_index(50.0).unwrap()], 1);
    }

    #[test]
    fn heralded_rejects_stale_herald() {
        let b = batch(&[0, 1, 2], &[0, 10_000, 10_050]);
        let hist = builder(1_000.0, 2).build(&b, Mode::HeraldedCrossCorrelation);
        assert_eq!(hist.total(), 0);
    }

    #[test]
    fn heralded_looks_back_lag_depth_clicks() {
        let b = batch(&[0, 2, 1, 2], &[0, 20, 40, 60]);
        assert_eq!(builder(1_000.0, 1).build(&b, Mode::HeraldedCrossCorrelation).total(), 0);
        assert_eq!(builder(1_000.0, 2).build(&b, Mode::HeraldedCrossCorrelation).total(), 1);
    }
}

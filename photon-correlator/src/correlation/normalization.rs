use std::collections::BTreeMap;

use crate::correlation::accumulator::AccumulatorState;
use crate::correlation::Mode;
use crate::errors::Error;
use crate::Channel;

/// Pair and heralding statistics of the two-detector modes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PairStatistics {
    pub pair_rate_uncorrected_hz: f64,
    pub pair_rate_corrected_hz: f64,
    pub heralding_efficiency_uncorrected: f64,
    pub heralding_efficiency_corrected: f64,
}

impl PairStatistics {
    fn undefined() -> Self {
        Self {
            pair_rate_uncorrected_hz: f64::NAN,
            pair_rate_corrected_hz: f64::NAN,
            heralding_efficiency_uncorrected: f64::NAN,
            heralding_efficiency_corrected: f64::NAN,
        }
    }
}

/// Summary statistics derived from the accumulated state.
///
/// `accidental_norm_factor` is the expected number of accidental coincidences
/// in one unbinned histogram bin. Dividing the histogram by it gives the
/// normalized correlation.
///
/// This holds in auto-correlation mode too: the factor carries no
/// `2^display_bin_factor` term. A rebinned view merges `2^k` bins, so it has to
/// be divided by `accidental_norm_factor * 2^k`, which is what
/// `display::normalized` does.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationResult {
    pub integration_time_s: f64,
    pub rate_khz: BTreeMap<Channel, f64>,
    pub accidental_norm_factor: f64,
    pub pairs: Option<PairStatistics>,
}

impl NormalizationResult {
    /// Result reported when the statistics cannot be computed. Every derived
    /// field is NaN.
    pub fn undefined(mode: Mode, integration_time_s: f64) -> Self {
        Self {
            integration_time_s,
            rate_khz: mode.channels().iter().map(|&c| (c, f64::NAN)).collect(),
            accidental_norm_factor: f64::NAN,
            pairs: if mode.has_pair_statistics() {
                Some(PairStatistics::undefined())
            } else {
                None
            },
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.accidental_norm_factor.is_nan()
    }

    pub fn rate(&self, channel: Channel) -> Option<f64> {
        self.rate_khz.get(&channel).copied()
    }
}

/// Compute rates, the accidental coincidence level and the pair statistics.
///
/// Fails with `DivisionUndefined` when the integration time is zero or one of the
/// rates entering the accidental estimate is zero.
pub fn normalize(
    state: &AccumulatorState,
    mode: Mode,
    bin_width_ps: f64,
) -> Result<NormalizationResult, Error> {
    let integration_time_s = state.integration_time_s;
    if integration_time_s <= 0.0 {
        return Err(Error::DivisionUndefined(format!(
            "integration time is {} s",
            integration_time_s
        )));
    }

    let rate_khz: BTreeMap<Channel, f64> = mode
        .channels()
        .iter()
        .map(|&c| (c, state.channel_counts.get(c) as f64 * 1e-3 / integration_time_s))
        .collect();
    let rate_hz = |c: Channel| -> Result<f64, Error> {
        let r = rate_khz.get(&c).copied().unwrap_or(0.0) * 1e3;
        if r > 0.0 {
            Ok(r)
        } else {
            Err(Error::DivisionUndefined(format!("no clicks on {}", c)))
        }
    };

    let bin_width_s = bin_width_ps * 1e-12;
    let (accidental_norm_factor, pairs) = match mode {
        Mode::AutoCorrelation(channel) => {
            let r = rate_hz(channel)?;
            (bin_width_s * integration_time_s * r * r, None)
        }
        Mode::CrossCorrelation | Mode::HeraldedCrossCorrelation => {
            let (a, b) = match mode {
                Mode::CrossCorrelation => (Channel::Herald, Channel::Signal),
                _ => (Channel::Signal, Channel::Auxiliary),
            };
            let accidentals = bin_width_s * integration_time_s * rate_hz(a)? * rate_hz(b)?;
            let herald_rate = rate_hz(Channel::Herald)?;

            let (n_bins, n_uncorrected) = state
                .histogram
                .as_ref()
                .map(|h| (h.bin_count() as f64, h.total() as f64))
                .unwrap_or((0.0, 0.0));
            // The whole accidental count is removed before dividing by time.
            let n_corrected = n_uncorrected - accidentals * n_bins;
            let heralds = integration_time_s * herald_rate;

            let pairs = PairStatistics {
                pair_rate_uncorrected_hz: n_uncorrected / integration_time_s,
                pair_rate_corrected_hz: n_corrected / integration_time_s,
                heralding_efficiency_uncorrected: n_uncorrected / heralds,
                heralding_efficiency_corrected: n_corrected / heralds,
            };
            (accidentals, Some(pairs))
        }
    };

    Ok(NormalizationResult {
        integration_time_s,
        rate_khz,
        accidental_norm_factor,
        pairs,
    })
}

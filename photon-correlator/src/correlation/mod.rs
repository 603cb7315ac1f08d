use std::str::FromStr;

use tracing::{info, warn};

use crate::errors::Error;
use crate::{Channel, TimeTagBatch};

pub mod accumulator;
pub mod binning;
pub mod display;
pub mod histogram;
pub mod normalization;

use accumulator::{AccumulatorState, BatchStats};
use binning::BinningSpec;
use histogram::{CorrelationHistogram, HistogramBuilder};
use normalization::NormalizationResult;

/// Which correlation the engine builds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Herald (ch0) against signal (ch1).
    CrossCorrelation,
    /// Signal (ch1) against auxiliary (ch2), gated on a preceding herald (ch0).
    HeraldedCrossCorrelation,
    /// Single channel against itself.
    AutoCorrelation(Channel),
}

impl Mode {
    /// Channels whose rates are reported in this mode.
    pub fn channels(&self) -> Vec<Channel> {
        match self {
            Mode::CrossCorrelation | Mode::HeraldedCrossCorrelation => Channel::ALL.to_vec(),
            Mode::AutoCorrelation(c) => vec![*c],
        }
    }

    pub fn has_pair_statistics(&self) -> bool {
        !matches!(self, Mode::AutoCorrelation(_))
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Mode::CrossCorrelation => write!(f, "Cross Correlation"),
            Mode::HeraldedCrossCorrelation => write!(f, "Heralded Cross Correlation"),
            Mode::AutoCorrelation(c) => write!(f, "Auto Correlation C{}", c.index()),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cross" => Ok(Mode::CrossCorrelation),
            "heralded" => Ok(Mode::HeraldedCrossCorrelation),
            "auto0" => Ok(Mode::AutoCorrelation(Channel::Herald)),
            "auto1" => Ok(Mode::AutoCorrelation(Channel::Signal)),
            "auto2" => Ok(Mode::AutoCorrelation(Channel::Auxiliary)),
            other => Err(Error::InvalidConfiguration(format!(
                "Unknown correlation mode '{}'",
                other
            ))),
        }
    }
}

/// Snapshot of one processing cycle.
///
/// Owned copies only, so it can be handed to another thread while the engine
/// keeps accumulating.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationOutput {
    pub mode: Mode,
    /// Bin centers in picoseconds.
    pub axis: Vec<f64>,
    pub histogram: Vec<u64>,
    pub stats: NormalizationResult,
}

/// Owns the accumulated state and runs histogram, merge and normalization for
/// every acquisition.
#[derive(Debug, Default)]
pub struct CorrelationEngine {
    state: AccumulatorState,
    spec: Option<BinningSpec>,
    mode: Option<Mode>,
    last_output: Option<CorrelationOutput>,
}

impl CorrelationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything accumulated so far.
    pub fn reset(&mut self) {
        self.state.reset();
        self.spec = None;
        self.mode = None;
        self.last_output = None;
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    pub fn binning(&self) -> Option<&BinningSpec> {
        self.spec.as_ref()
    }

    pub fn last_output(&self) -> Option<&CorrelationOutput> {
        self.last_output.as_ref()
    }

    /// Process one acquisition.
    ///
    /// A change of mode or of binning since the previous call starts a fresh
    /// accumulation whatever `cumulative` says. Undefined statistics are reported
    /// as NaN and do not fail the call.
    pub fn process(
        &mut self,
        batch: TimeTagBatch,
        mode: Mode,
        n_lags: usize,
        max_delay_ps: f64,
        cumulative: bool,
    ) -> Result<CorrelationOutput, Error> {
        if n_lags == 0 {
            return Err(Error::InvalidConfiguration(String::from(
                "Lag depth must be at least 1",
            )));
        }
        let spec = BinningSpec::new(max_delay_ps)?;

        let mut cumulative = cumulative;
        if self.spec != Some(spec) || self.mode != Some(mode) {
            if cumulative && self.state.histogram.is_some() {
                info!(%mode, bins = spec.bin_count, "correlation settings changed, restarting accumulation");
            }
            cumulative = false;
        }
        self.spec = Some(spec);
        self.mode = Some(mode);

        let histogram = HistogramBuilder::init(spec, n_lags).build(&batch, mode);
        let stats = BatchStats::from_batch(&batch, mode);

        if let Err(e) = self.state.merge(histogram.clone(), stats, cumulative) {
            warn!(error = %e, "forcing accumulator reset");
            self.state.merge(histogram, stats, false)?;
        }

        let normalization = match normalization::normalize(&self.state, mode, spec.bin_width_ps) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "correlation statistics undefined");
                NormalizationResult::undefined(mode, self.state.integration_time_s)
            }
        };

        let accumulated = match &self.state.histogram {
            Some(h) => h.clone(),
            None => CorrelationHistogram::zeros(&spec),
        };
        let output = CorrelationOutput {
            mode,
            axis: accumulated.bin_centers_ps,
            histogram: accumulated.counts,
            stats: normalization,
        };
        self.last_output = Some(output.clone());
        Ok(output)
    }
}

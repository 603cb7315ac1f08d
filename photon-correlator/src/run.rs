use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use crate::acquisition::Acquisition;
use crate::config::CorrelatorConfig;
use crate::correlation::{CorrelationEngine, CorrelationOutput, Mode};
use crate::errors::Error;
use crate::{Channel, TimeTagBatch};

/// Per cycle record kept while a run is going.
///
/// `integration_time_s` is the accumulated integration time after the cycle.
/// Rates are those of the single batch of the cycle, not the accumulated ones.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CycleRecord {
    pub elapsed_time_s: f64,
    pub integration_time_s: f64,
    pub rate_khz: [f64; 3],
}

/// Why a continuous run came to an end.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunEnd {
    Stopped,
    SourceExhausted,
    CycleLimit,
}

/// Flags shared with whoever controls a continuous run.
///
/// Both are read between cycles, so they can be flipped from another thread or
/// from the per cycle callback while the run is going.
#[derive(Debug, Default)]
pub struct RunControls {
    stop: AtomicBool,
    cumulative: AtomicBool,
}

impl RunControls {
    pub fn new(cumulative: bool) -> Self {
        Self {
            stop: AtomicBool::new(false),
            cumulative: AtomicBool::new(cumulative),
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn set_cumulative(&self, cumulative: bool) {
        self.cumulative.store(cumulative, Ordering::SeqCst);
    }

    pub fn cumulative(&self) -> bool {
        self.cumulative.load(Ordering::SeqCst)
    }
}

/// Drives acquire, process cycles against one engine.
pub struct Runner {
    engine: CorrelationEngine,
    config: CorrelatorConfig,
    cycle_log: Vec<CycleRecord>,
    started: Instant,
}

impl Runner {
    pub fn new(config: CorrelatorConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            engine: CorrelationEngine::new(),
            config,
            cycle_log: Vec::new(),
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    pub fn engine(&self) -> &CorrelationEngine {
        &self.engine
    }

    pub fn cycle_log(&self) -> &[CycleRecord] {
        &self.cycle_log
    }

    pub fn last_output(&self) -> Option<&CorrelationOutput> {
        self.engine.last_output()
    }

    /// Install new settings. Whatever was accumulated is dropped.
    pub fn apply(&mut self, config: CorrelatorConfig) -> Result<(), Error> {
        config.validate()?;
        self.config = config;
        self.engine.reset();
        Ok(())
    }

    /// Switch correlation mode, starting a fresh accumulation.
    pub fn select_mode(&mut self, mode: Mode) {
        self.config.mode = mode;
        self.engine.reset();
    }

    /// A single acquisition, never cumulative.
    pub fn run_once<A: Acquisition>(&mut self, source: &mut A) -> Result<CorrelationOutput, Error> {
        self.start_run();
        self.cycle(source, false)
    }

    /// Acquire and process until a stop is requested, the source runs dry or
    /// `max_cycles` cycles have run.
    ///
    /// The first cycle always starts a fresh accumulation. Later cycles follow
    /// the cumulative flag of `controls`, which is read anew before every cycle.
    /// Each cycle's output is handed to `on_cycle` as soon as it is computed.
    /// An acquisition error ends the run and is returned.
    pub fn run_continuous<A, F>(
        &mut self,
        source: &mut A,
        controls: &RunControls,
        max_cycles: Option<usize>,
        mut on_cycle: F,
    ) -> Result<RunEnd, Error>
    where
        A: Acquisition,
        F: FnMut(&CorrelationOutput),
    {
        self.start_run();
        let mut cycles = 0;
        loop {
            if controls.stop_requested() {
                info!(cycles, "run stopped");
                return Ok(RunEnd::Stopped);
            }
            if max_cycles.map_or(false, |m| cycles >= m) {
                return Ok(RunEnd::CycleLimit);
            }
            if source.exhausted() {
                info!(cycles, "acquisition source exhausted");
                return Ok(RunEnd::SourceExhausted);
            }
            self.config.cumulative_mode = controls.cumulative();
            let cumulative = cycles > 0 && self.config.cumulative_mode;
            let output = self.cycle(source, cumulative)?;
            on_cycle(&output);
            cycles += 1;
        }
    }

    fn start_run(&mut self) {
        self.started = Instant::now();
        self.cycle_log.clear();
    }

    fn cycle<A: Acquisition>(
        &mut self,
        source: &mut A,
        cumulative: bool,
    ) -> Result<CorrelationOutput, Error> {
        let batch = source.acquire(self.config.max_counts, self.config.max_recording_time_ms())?;
        let rate_khz = batch_rates(&batch);

        let cfg = self.config;
        let output = self.engine.process(
            batch,
            cfg.mode,
            cfg.lag_depth,
            cfg.max_correlation_delay_ps as f64,
            cumulative,
        )?;
        self.cycle_log.push(CycleRecord {
            elapsed_time_s: self.started.elapsed().as_secs_f64(),
            integration_time_s: self.engine.state().integration_time_s,
            rate_khz,
        });
        report(&output);
        Ok(output)
    }
}

fn batch_rates(batch: &TimeTagBatch) -> [f64; 3] {
    let integration_time_s = batch.integration_time_s();
    let counts = batch.channel_counts();
    let mut rate_khz = [f64::NAN; 3];
    if integration_time_s > 0.0 {
        for c in Channel::ALL.iter() {
            rate_khz[c.index()] = counts.get(*c) as f64 * 1e-3 / integration_time_s;
        }
    } else {
        warn!(clicks = batch.len(), "acquisition with zero length");
    }
    rate_khz
}

fn report(output: &CorrelationOutput) {
    let stats = &output.stats;
    let rates = stats
        .rate_khz
        .iter()
        .map(|(c, r)| format!("{}={:.3} kHz", c, r))
        .collect::<Vec<_>>()
        .join(", ");
    match &stats.pairs {
        Some(p) => info!(
            mode = %output.mode,
            integration_time_s = stats.integration_time_s,
            rates = %rates,
            pair_rate_uncorrected_hz = p.pair_rate_uncorrected_hz,
            pair_rate_corrected_hz = p.pair_rate_corrected_hz,
            heralding_efficiency_uncorrected = p.heralding_efficiency_uncorrected,
            heralding_efficiency_corrected = p.heralding_efficiency_corrected,
            "correlation updated"
        ),
        None => info!(
            mode = %output.mode,
            integration_time_s = stats.integration_time_s,
            rates = %rates,
            "correlation updated"
        ),
    }
}

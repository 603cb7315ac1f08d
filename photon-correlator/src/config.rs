use crate::correlation::binning::BinningSpec;
use crate::correlation::Mode;
use crate::errors::Error;

/// Parameters of a correlation measurement
///
/// # Parameters
///    - max_recording_time_s: Longest time a single acquisition may take in seconds
///    - max_counts: Largest number of clicks collected per acquisition
///    - max_correlation_delay_ps: Longest delay kept in the histogram in picoseconds
///    - display_bin_factor: Number of power of two rebinnings applied for display
///    - lag_depth: Number of following clicks each click is paired with
///    - cumulative_mode: Keep summing acquisitions instead of starting over each time
///    - mode: Which correlation to compute
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CorrelatorConfig {
    pub max_recording_time_s: u64,
    pub max_counts: u64,
    pub max_correlation_delay_ps: u64,
    pub display_bin_factor: u32,
    pub lag_depth: usize,
    pub cumulative_mode: bool,
    pub mode: Mode,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_recording_time_s: 1,
            max_counts: 1_000_000,
            max_correlation_delay_ps: 40_000,
            display_bin_factor: 1,
            lag_depth: 2,
            cumulative_mode: true,
            mode: Mode::CrossCorrelation,
        }
    }
}

impl CorrelatorConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_recording_time_s == 0 {
            return Err(Error::InvalidConfiguration(String::from(
                "Maximum recording time must be positive",
            )));
        }
        if self.max_counts == 0 {
            return Err(Error::InvalidConfiguration(String::from(
                "Maximum number of counts must be positive",
            )));
        }
        if self.lag_depth == 0 {
            return Err(Error::InvalidConfiguration(String::from(
                "Lag depth must be at least 1",
            )));
        }
        if self.display_bin_factor >= 32 {
            return Err(Error::InvalidConfiguration(format!(
                "Display binning factor {} is too large",
                self.display_bin_factor
            )));
        }
        BinningSpec::new(self.max_correlation_delay_ps as f64)?;
        Ok(())
    }

    pub fn max_recording_time_ms(&self) -> u64 {
        self.max_recording_time_s.saturating_mul(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CorrelatorConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_recording_time_ms(), 1000);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            CorrelatorConfig { max_recording_time_s: 0, ..Default::default() },
            CorrelatorConfig { max_counts: 0, ..Default::default() },
            CorrelatorConfig { lag_depth: 0, ..Default::default() },
            CorrelatorConfig { max_correlation_delay_ps: 0, ..Default::default() },
            CorrelatorConfig { max_correlation_delay_ps: 20, ..Default::default() },
            CorrelatorConfig { display_bin_factor: 40, ..Default::default() },
        ];
        for cfg in bad.iter() {
            assert!(matches!(cfg.validate(), Err(Error::InvalidConfiguration(_))), "{:?}", cfg);
        }
    }
}

use crate::errors::Error;

/// Width of a histogram bin in picoseconds. This is the native timing
/// resolution of the time tagger.
pub const BIN_WIDTH_PS: f64 = 26.9851;

// Keeps floor() from truncating an exact multiple of the bin width.
const BIN_COUNT_EPSILON: f64 = 1e-10;

/// Fixed-width binning of the delay axis.
///
/// The range starts half a bin below zero so that the first bin is centered at
/// zero delay.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BinningSpec {
    pub bin_width_ps: f64,
    pub bin_count: usize,
    pub range_start_ps: f64,
    pub range_end_ps: f64,
}

impl BinningSpec {
    /// Derive the binning for a maximum correlation delay in picoseconds.
    pub fn new(max_delay_ps: f64) -> Result<Self, Error> {
        if !max_delay_ps.is_finite() || max_delay_ps <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "Maximum correlation delay must be positive, got {} ps",
                max_delay_ps
            )));
        }
        let bin_count = (max_delay_ps / BIN_WIDTH_PS + BIN_COUNT_EPSILON).floor() as usize;
        if bin_count == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "Maximum correlation delay of {} ps is shorter than one bin ({} ps)",
                max_delay_ps, BIN_WIDTH_PS
            )));
        }
        let range_start_ps = -BIN_WIDTH_PS / 2.0;
        Ok(Self {
            bin_width_ps: BIN_WIDTH_PS,
            bin_count,
            range_start_ps,
            range_end_ps: range_start_ps + (bin_count as f64) * BIN_WIDTH_PS,
        })
    }

    /// Bin holding `delay_ps`, or `None` when it falls outside the range.
    ///
    /// Bins are half open except for the last one, which also takes delays
    /// landing exactly on `range_end_ps`.
    #[inline]
    pub fn bin_index(&self, delay_ps: f64) -> Option<usize> {
        if !(delay_ps >= self.range_start_ps && delay_ps <= self.range_end_ps) {
            return None;
        }
        let idx = ((delay_ps - self.range_start_ps) / self.bin_width_ps).floor() as usize;
        Some(idx.min(self.bin_count - 1))
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        (0..self.bin_count)
            .map(|i| self.range_start_ps + ((i as f64) + 0.5) * self.bin_width_ps)
            .collect()
    }
}

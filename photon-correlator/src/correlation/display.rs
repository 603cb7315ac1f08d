//! Power of two rebinning of a histogram for presentation.
//!
//! Nothing here touches the accumulated state. Statistics are always computed
//! on the full resolution histogram.

/// Merge adjacent bins `bin_factor` times.
///
/// Each pass sums neighbouring counts and averages neighbouring axis values,
/// halving the length and dropping a trailing odd element.
pub fn bindata(x: &[f64], y: &[u64], bin_factor: u32) -> (Vec<f64>, Vec<u64>) {
    let mut x = x.to_vec();
    let mut y = y.to_vec();
    for _ in 0..bin_factor {
        y = y.chunks_exact(2).map(|p| p[0] + p[1]).collect();
        x = x.chunks_exact(2).map(|p| (p[0] + p[1]) / 2.0).collect();
    }
    (x, y)
}

/// Rebinned view of the histogram divided by the accidental level.
///
/// `norm_factor` is the accidental count of one unbinned bin, so every merged
/// bin is divided by `norm_factor * 2^bin_factor`. A value of 1 means no
/// correlation.
pub fn normalized(x: &[f64], y: &[u64], bin_factor: u32, norm_factor: f64) -> (Vec<f64>, Vec<f64>) {
    let (x, y) = bindata(x, y, bin_factor);
    let scale = norm_factor * 2f64.powi(bin_factor as i32);
    (x, y.into_iter().map(|v| v as f64 / scale).collect())
}

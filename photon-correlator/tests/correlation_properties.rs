use approx::assert_relative_eq;
use proptest::prelude::*;

use photon_correlator::correlation::binning::{BinningSpec, BIN_WIDTH_PS};
use photon_correlator::correlation::display::bindata;
use photon_correlator::correlation::normalization::normalize;
use photon_correlator::correlation::{CorrelationEngine, Mode};
use photon_correlator::errors::Error;
use photon_correlator::{Channel, TimeTag, TimeTagBatch};

const MODES: [Mode; 5] = [
    Mode::CrossCorrelation,
    Mode::HeraldedCrossCorrelation,
    Mode::AutoCorrelation(Channel::Herald),
    Mode::AutoCorrelation(Channel::Signal),
    Mode::AutoCorrelation(Channel::Auxiliary),
];

/// Random batch with non-decreasing timestamps, steps small enough that many
/// pairs land inside a 2 ns window.
fn batch_strategy() -> impl Strategy<Value = TimeTagBatch> {
    prop::collection::vec((0i32..3, 0u64..400), 0..80).prop_map(|steps| {
        let mut t = 0;
        let tags = steps
            .into_iter()
            .map(|(ch, dt)| {
                t += dt;
                TimeTag::new(Channel::from_raw(ch).unwrap(), t)
            })
            .collect();
        TimeTagBatch::new(tags)
    })
}

proptest! {
    #[test]
    fn bin_count_matches_formula(max_delay_ps in 27.0f64..1e7) {
        let spec = BinningSpec::new(max_delay_ps).unwrap();
        prop_assert_eq!(spec.bin_count, (max_delay_ps / BIN_WIDTH_PS + 1e-10).floor() as usize);
        let width = spec.range_end_ps - spec.range_start_ps;
        prop_assert!((width - spec.bin_count as f64 * BIN_WIDTH_PS).abs() < 1e-6);
    }

    #[test]
    fn histogram_total_is_bounded(batch in batch_strategy(), n_lags in 1usize..5, mode_idx in 0usize..5) {
        let mut engine = CorrelationEngine::new();
        let len = batch.len();
        let out = engine.process(batch, MODES[mode_idx], n_lags, 2_000.0, false).unwrap();
        let total: u64 = out.histogram.iter().sum();
        prop_assert!(total <= (len * n_lags) as u64);
        prop_assert_eq!(out.axis.len(), out.histogram.len());
    }

    #[test]
    fn cumulative_merge_order_is_irrelevant(
        b1 in batch_strategy(),
        b2 in batch_strategy(),
        n_lags in 1usize..4,
        mode_idx in 0usize..5,
    ) {
        let mode = MODES[mode_idx];
        let mut forward = CorrelationEngine::new();
        forward.process(b1.clone(), mode, n_lags, 2_000.0, true).unwrap();
        let f = forward.process(b2.clone(), mode, n_lags, 2_000.0, true).unwrap();

        let mut backward = CorrelationEngine::new();
        backward.process(b2.clone(), mode, n_lags, 2_000.0, true).unwrap();
        let b = backward.process(b1.clone(), mode, n_lags, 2_000.0, true).unwrap();

        prop_assert_eq!(&f.histogram, &b.histogram);
        prop_assert_eq!(forward.state().channel_counts, backward.state().channel_counts);
        prop_assert_eq!(forward.state().integration_time_s, backward.state().integration_time_s);

        // and equals the sum of the two histograms built on their own
        let single_1 = CorrelationEngine::new().process(b1, mode, n_lags, 2_000.0, false).unwrap();
        let single_2 = CorrelationEngine::new().process(b2, mode, n_lags, 2_000.0, false).unwrap();
        let summed: Vec<u64> = single_1
            .histogram
            .iter()
            .zip(single_2.histogram.iter())
            .map(|(a, b)| a + b)
            .collect();
        prop_assert_eq!(f.histogram, summed);
    }

    #[test]
    fn non_cumulative_processing_is_idempotent(batch in batch_strategy(), mode_idx in 0usize..5) {
        let mut engine = CorrelationEngine::new();
        let first = engine.process(batch.clone(), MODES[mode_idx], 2, 2_000.0, false).unwrap();
        let second = engine.process(batch, MODES[mode_idx], 2, 2_000.0, false).unwrap();
        prop_assert_eq!(first.histogram, second.histogram);
        prop_assert_eq!(first.axis, second.axis);
        prop_assert_eq!(first.stats.integration_time_s, second.stats.integration_time_s);
    }

    #[test]
    fn bindata_length_and_sum(y in prop::collection::vec(0u64..1000, 0..200), k in 0u32..6) {
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        let (bx, by) = bindata(&x, &y, k);
        prop_assert_eq!(by.len(), y.len() >> k);
        prop_assert_eq!(bx.len(), by.len());
        // merged bins only ever cover the leading len' * 2^k elements
        let kept = by.len() << k;
        prop_assert_eq!(by.iter().sum::<u64>(), y[..kept].iter().sum::<u64>());
    }
}

#[test]
fn bindata_identity() {
    let x = vec![0.0, 26.9851, 53.9702];
    let y = vec![4, 0, 9];
    assert_eq!(bindata(&x, &y, 0), (x, y));
}

#[test]
fn two_pair_scenario() {
    let batch = TimeTagBatch::from_columns(&[0, 1, 0, 1], &[0, 10, 1000, 1015]).unwrap();
    let out = CorrelationEngine::new()
        .process(batch, Mode::CrossCorrelation, 1, 40_000.0, false)
        .unwrap();
    assert_eq!(out.histogram.len(), 1482);
    assert_eq!(out.histogram.iter().sum::<u64>(), 2);
    // both delays fall within the first two bins, below 26.9851 ps
    assert_eq!(out.histogram[0] + out.histogram[1], 2);
    assert_relative_eq!(out.axis[0], 0.0, epsilon = 1e-9);
}

#[test]
fn zero_integration_time_leaves_histogram_valid() {
    // all clicks at t = 0
    let batch = TimeTagBatch::from_columns(&[0, 1, 0, 1], &[0, 0, 0, 0]).unwrap();
    let mut engine = CorrelationEngine::new();
    let out = engine
        .process(batch, Mode::CrossCorrelation, 1, 40_000.0, false)
        .unwrap();
    assert_eq!(out.histogram.iter().sum::<u64>(), 2);
    assert_eq!(out.axis.len(), out.histogram.len());
    assert!(!out.stats.is_defined());
    assert!(out.stats.rate_khz.values().all(|r| r.is_nan()));
    let pairs = out.stats.pairs.unwrap();
    assert!(pairs.pair_rate_uncorrected_hz.is_nan());
    assert!(pairs.pair_rate_corrected_hz.is_nan());
    assert!(pairs.heralding_efficiency_uncorrected.is_nan());
    assert!(pairs.heralding_efficiency_corrected.is_nan());

    assert!(matches!(
        normalize(engine.state(), Mode::CrossCorrelation, BIN_WIDTH_PS),
        Err(Error::DivisionUndefined(_))
    ));
}

#[test]
fn leaving_cumulative_mode_resets_the_accumulation() {
    let batch = TimeTagBatch::from_columns(&[0, 1, 0, 1], &[0, 10, 1000, 1015]).unwrap();
    let mut engine = CorrelationEngine::new();
    for _ in 0..3 {
        engine
            .process(batch.clone(), Mode::CrossCorrelation, 1, 40_000.0, true)
            .unwrap();
    }
    assert_eq!(engine.last_output().unwrap().histogram.iter().sum::<u64>(), 6);

    let out = engine
        .process(batch, Mode::CrossCorrelation, 1, 40_000.0, false)
        .unwrap();
    assert_eq!(out.histogram.iter().sum::<u64>(), 2);
    assert_relative_eq!(engine.state().integration_time_s, 1015e-12);
}

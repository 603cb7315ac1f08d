//! Writing correlation results to disk.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array1;
use ndarray_npy::NpzWriter;

use crate::correlation::normalization::NormalizationResult;
use crate::correlation::{CorrelationOutput, Mode};
use crate::errors::Error;
use crate::run::CycleRecord;

const TIMED_HEADER: &str = "Time from start (s), Integration time (s), Ch0 count rate (kHz), Ch1 count rate (kHz), Ch2 count rate (kHz)";

/// Sibling of `path` named `<stem><suffix>.txt`, so `corr.csv` with `-info`
/// gives `corr-info.txt`.
pub fn companion_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}.txt", stem, suffix))
}

/// Histogram as two comma separated columns, delay in ps and counts.
pub fn save_csv<P: AsRef<Path>>(path: P, output: &CorrelationOutput) -> Result<(), Error> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    for (t, n) in output.axis.iter().zip(output.histogram.iter()) {
        writeln!(out, "{},{}", t, n)?;
    }
    out.flush()?;
    Ok(())
}

fn info_header(mode: Mode) -> String {
    let channels = mode
        .channels()
        .iter()
        .map(|c| format!("Ch{} count rate (kHz)", c.index()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Integration time (s), {}", channels)
}

/// Integration time and the accumulated rates of each channel of the mode.
pub fn save_info<P: AsRef<Path>>(path: P, mode: Mode, stats: &NormalizationResult) -> Result<(), Error> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    writeln!(out, "# {}", info_header(mode))?;
    let mut row = vec![stats.integration_time_s];
    row.extend(mode.channels().iter().map(|&c| stats.rate(c).unwrap_or(f64::NAN)));
    writeln!(out, "{}", join(&row))?;
    out.flush()?;
    Ok(())
}

/// One line per acquisition of the run.
pub fn save_timed<P: AsRef<Path>>(path: P, log: &[CycleRecord]) -> Result<(), Error> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    writeln!(out, "# {}", TIMED_HEADER)?;
    for record in log {
        let mut row = vec![record.elapsed_time_s, record.integration_time_s];
        row.extend_from_slice(&record.rate_khz);
        writeln!(out, "{}", join(&row))?;
    }
    out.flush()?;
    Ok(())
}

/// `axis` and `histogram` arrays in an npz archive.
pub fn save_npz<P: AsRef<Path>>(path: P, output: &CorrelationOutput) -> Result<(), Error> {
    let mut npz = NpzWriter::new(std::fs::File::create(path)?);
    npz.add_array("axis", &Array1::from(output.axis.clone()))?;
    npz.add_array("histogram", &Array1::from(output.histogram.clone()))?;
    npz.finish()?;
    Ok(())
}

fn join(row: &[f64]) -> String {
    row.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationEngine;
    use crate::{Channel, TimeTagBatch};
    use ndarray_npy::NpzReader;

    fn output(mode: Mode) -> CorrelationOutput {
        let batch = TimeTagBatch::from_columns(&[0, 1, 0, 1], &[0, 10, 1000, 1015]).unwrap();
        CorrelationEngine::new()
            .process(batch, mode, 1, 100.0, false)
            .unwrap()
    }

    #[test]
    fn csv_has_one_line_per_bin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corr.csv");
        let out = output(Mode::CrossCorrelation);
        save_csv(&path, &out).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "0,1");
        assert!(lines[1].ends_with(",1"));
    }

    #[test]
    fn companion_files_use_a_dashed_suffix() {
        let csv = Path::new("/data/run3/corr.csv");
        assert_eq!(companion_path(csv, "-info"), PathBuf::from("/data/run3/corr-info.txt"));
        assert_eq!(companion_path(csv, "-timed"), PathBuf::from("/data/run3/corr-timed.txt"));
        assert_eq!(companion_path(Path::new("corr"), "-info"), PathBuf::from("corr-info.txt"));
    }

    #[test]
    fn info_header_follows_mode() {
        assert_eq!(
            info_header(Mode::AutoCorrelation(Channel::Signal)),
            "Integration time (s), Ch1 count rate (kHz)"
        );
        assert_eq!(
            info_header(Mode::CrossCorrelation),
            "Integration time (s), Ch0 count rate (kHz), Ch1 count rate (kHz), Ch2 count rate (kHz)"
        );
    }

    #[test]
    fn info_and_timed_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = output(Mode::CrossCorrelation);
        save_info(dir.path().join("info.txt"), out.mode, &out.stats).unwrap();
        let info = std::fs::read_to_string(dir.path().join("info.txt")).unwrap();
        assert_eq!(info.lines().count(), 2);

        let log = vec![CycleRecord {
            elapsed_time_s: 1.5,
            integration_time_s: 1.0,
            rate_khz: [1.0, 2.0, 3.0],
        }];
        save_timed(dir.path().join("timed.txt"), &log).unwrap();
        let timed = std::fs::read_to_string(dir.path().join("timed.txt")).unwrap();
        assert_eq!(timed.lines().nth(1).unwrap(), "1.5,1,1,2,3");
    }

    #[test]
    fn npz_holds_axis_and_histogram() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corr.npz");
        let out = output(Mode::CrossCorrelation);
        save_npz(&path, &out).unwrap();

        let mut npz = NpzReader::new(std::fs::File::open(&path).unwrap()).unwrap();
        let hist: Array1<u64> = npz.by_name("histogram.npy").unwrap();
        let axis: Array1<f64> = npz.by_name("axis.npy").unwrap();
        assert_eq!(hist.to_vec(), out.histogram);
        assert_eq!(axis.len(), out.axis.len());
    }
}

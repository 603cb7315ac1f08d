use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{App, Arg};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use photon_correlator::acquisition::ReplaySource;
use photon_correlator::config::CorrelatorConfig;
use photon_correlator::correlation::display;
use photon_correlator::correlation::Mode;
use photon_correlator::export;
use photon_correlator::parsers::tags::TagFile;
use photon_correlator::run::{RunControls, Runner};

fn parse_arg<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str, default: T) -> Result<T>
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    match matches.value_of(name) {
        Some(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value '{}' for --{}: {}", v, name, e)),
        None => Ok(default),
    }
}

pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = App::new("correlator")
        .about("Photon correlation histograms from recorded time tags")
        .arg(Arg::with_name("FILE").help("Tag file to replay").required(true).index(1))
        .arg(Arg::with_name("mode").long("mode").takes_value(true)
             .possible_values(&["cross", "heralded", "auto0", "auto1", "auto2"])
             .help("Correlation to compute"))
        .arg(Arg::with_name("max-time-s").long("max-time-s").takes_value(true)
             .help("Maximum recording time of one acquisition in seconds"))
        .arg(Arg::with_name("max-counts").long("max-counts").takes_value(true)
             .help("Maximum number of clicks per acquisition"))
        .arg(Arg::with_name("max-delay-ps").long("max-delay-ps").takes_value(true)
             .help("Maximum correlation delay in picoseconds"))
        .arg(Arg::with_name("bin-factor").long("bin-factor").takes_value(true)
             .help("Number of power of two rebinnings of the displayed histogram"))
        .arg(Arg::with_name("lags").long("lags").takes_value(true)
             .help("Number of following clicks paired with each click"))
        .arg(Arg::with_name("no-cumulative").long("no-cumulative")
             .help("Start over on every acquisition"))
        .arg(Arg::with_name("once").long("once").help("Run a single acquisition"))
        .arg(Arg::with_name("cycles").long("cycles").takes_value(true)
             .help("Stop after this many acquisitions"))
        .arg(Arg::with_name("csv").long("csv").takes_value(true)
             .help("Save the histogram, info and per cycle rates next to this csv path"))
        .arg(Arg::with_name("npz").long("npz").takes_value(true)
             .help("Save axis and histogram to an npz archive"))
        .get_matches();

    let defaults = CorrelatorConfig::default();
    let config = CorrelatorConfig {
        max_recording_time_s: parse_arg(&matches, "max-time-s", defaults.max_recording_time_s)?,
        max_counts: parse_arg(&matches, "max-counts", defaults.max_counts)?,
        max_correlation_delay_ps: parse_arg(&matches, "max-delay-ps", defaults.max_correlation_delay_ps)?,
        display_bin_factor: parse_arg(&matches, "bin-factor", defaults.display_bin_factor)?,
        lag_depth: parse_arg(&matches, "lags", defaults.lag_depth)?,
        cumulative_mode: !matches.is_present("no-cumulative"),
        mode: parse_arg::<Mode>(&matches, "mode", defaults.mode)?,
    };
    let max_cycles = match matches.value_of("cycles") {
        Some(_) => Some(parse_arg(&matches, "cycles", 0usize)?),
        None => None,
    };

    let filename = PathBuf::from(matches.value_of("FILE").unwrap_or_default());
    let tag_file = TagFile::new(filename).context("opening tag file")?;
    println!("{}", tag_file);

    let mut source = ReplaySource::from_file(&tag_file)?;
    let mut runner = Runner::new(config)?;
    if matches.is_present("once") {
        runner.run_once(&mut source)?;
    } else {
        let controls = RunControls::new(config.cumulative_mode);
        let end = runner.run_continuous(&mut source, &controls, max_cycles, |out| {
            debug!(mode = %out.mode, integration_time_s = out.stats.integration_time_s, "cycle output ready")
        })?;
        info!(?end, cycles = runner.cycle_log().len(), "run finished");
    }

    let output = match runner.last_output() {
        Some(o) => o.clone(),
        None => anyhow::bail!("no acquisition was processed"),
    };

    if output.stats.is_defined() {
        let (x, g) = display::normalized(
            &output.axis,
            &output.histogram,
            config.display_bin_factor,
            output.stats.accidental_norm_factor,
        );
        let peak = x
            .iter()
            .zip(g.iter())
            .fold((0.0, f64::MIN), |acc, (&t, &v)| if v > acc.1 { (t, v) } else { acc });
        println!("Peak normalised correlation {:.3} at {:.3} ns", peak.1, peak.0 / 1e3);
    } else {
        println!("Not enough data for normalised statistics");
    }

    if let Some(csv) = matches.value_of("csv") {
        let csv = PathBuf::from(csv);
        export::save_csv(&csv, &output).context("saving correlation csv")?;
        export::save_info(export::companion_path(&csv, "-info"), output.mode, &output.stats)?;
        export::save_timed(export::companion_path(&csv, "-timed"), runner.cycle_log())?;
    }
    if let Some(npz) = matches.value_of("npz") {
        export::save_npz(npz, &output).context("saving npz archive")?;
    }
    Ok(())
}

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use spectrovision_lib::worker::{self, WorkerEvent};
use spectrovision_lib::{
    AcquisitionSettings, Coordinator, DeviceConfig, Instrument, IntegrationMode, SensorFamily, Spectrum, list_devices,
};

/// Continuous capture from every attached spectroradiometer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Acquisition settings as JSON, applied to every head.
    #[arg(short = 'c', long)]
    settings: Option<PathBuf>,
    /// Fixed integration time in µs (disables auto-integration).
    #[arg(short, long)]
    integration: Option<u32>,
    /// Merge the first VIS head and the first NIR head into one 340-1100 nm spectrum.
    #[arg(short, long)]
    pair: bool,
    /// Let every head run on its own instead of triggering them together.
    #[arg(long, conflicts_with = "pair")]
    free_running: bool,
    /// Stop after this many cycles (synchronised) or spectra (free-running).
    #[arg(short = 'n', long)]
    count: Option<u64>,
    /// Append each spectrum as one JSON line to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv; RUST_LOG overrides.
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run_capture(cli).await {
        error!("Capture failed: {:?}", e);
        process::exit(1);
    }

    Ok(())
}

/// Writes one JSON object per spectrum.
struct SpectrumSink {
    out: Option<BufWriter<File>>,
}

impl SpectrumSink {
    fn open(path: Option<&PathBuf>) -> Result<Self> {
        let out = match path {
            Some(path) => Some(BufWriter::new(
                File::options()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open output file {:?}", path))?,
            )),
            None => None,
        };
        Ok(Self { out })
    }

    fn record(&mut self, name: &str, devices: &[usize], spectrum: &Spectrum) -> Result<()> {
        let peak = spectrum.values.iter().copied().fold(f64::MIN, f64::max);
        info!(
            head = name,
            range = %format!("{}-{} nm", spectrum.grid.first, spectrum.grid.last),
            integration_us = spectrum.integration_us,
            peak = %format!("{:.2}", peak),
            "Spectrum"
        );
        if let Some(out) = self.out.as_mut() {
            let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            let line = json!({
                "timestamp": timestamp.as_secs_f64(),
                "name": name,
                "devices": devices,
                "spectrum": spectrum,
            });
            writeln!(out, "{}", line)?;
            out.flush()?;
        }
        Ok(())
    }
}

async fn run_capture(cli: Cli) -> Result<()> {
    let mut settings = match &cli.settings {
        Some(path) => AcquisitionSettings::from_json_file(path)
            .with_context(|| format!("Failed to load settings from {:?}", path))?,
        None => AcquisitionSettings::default(),
    };
    if let Some(micros) = cli.integration {
        settings.integration = IntegrationMode::Manual { micros };
    }
    settings.validate()?;

    let instruments = open_all(&settings).await?;
    let mut sink = SpectrumSink::open(cli.output.as_ref())?;

    let (stop_tx, stop) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, stopping capture...");
            let _ = stop_tx.send(true);
        }
    });

    if cli.free_running {
        run_free(instruments, stop, cli.count, &mut sink).await
    } else {
        run_synchronised(instruments, stop, cli.pair, cli.count, &mut sink).await
    }
}

async fn open_all(settings: &AcquisitionSettings) -> Result<Vec<Instrument>> {
    let heads = list_devices()?;
    if heads.is_empty() {
        bail!("No spectroradiometer found");
    }
    info!(count = heads.len(), "Spectroradiometers found");

    let mut instruments = Vec::with_capacity(heads.len());
    for head in heads {
        let Some(serial) = head.serial_number.clone() else {
            warn!(%head, "Head reports no USB serial, skipping");
            continue;
        };
        let mut instrument = match Instrument::connect(DeviceConfig::default().with_serial(serial)).await {
            Ok(instrument) => instrument,
            Err(e) => {
                warn!(%head, error = %e, "Could not open head, skipping");
                continue;
            }
        };
        instrument.apply_settings(settings.clone()).await?;
        info!(
            name = %instrument.name(),
            family = %instrument.family(),
            grid = %format!("{}-{} nm", instrument.grid().first, instrument.grid().last),
            "Head ready"
        );
        instruments.push(instrument);
    }
    if instruments.is_empty() {
        bail!("No spectroradiometer could be opened");
    }
    Ok(instruments)
}

async fn run_synchronised(
    instruments: Vec<Instrument>,
    mut stop: watch::Receiver<bool>,
    pair: bool,
    count: Option<u64>,
    sink: &mut SpectrumSink,
) -> Result<()> {
    let mut coordinator = Coordinator::new(instruments);
    if pair {
        let find = |family: SensorFamily| coordinator.instruments().iter().position(|i| i.family() == family);
        match (find(SensorFamily::Vis), find(SensorFamily::Nir)) {
            (Some(vis), Some(nir)) => coordinator.pair(vis, nir)?,
            _ => warn!("Pairing needs one VIS and one NIR head; capturing unpaired"),
        }
    }

    let mut cycles = 0u64;
    while count.is_none_or(|max| cycles < max) {
        let Some(measurements) = coordinator.acquire_all(&mut stop).await else {
            break;
        };
        cycles += 1;
        debug!(cycle = cycles, results = measurements.len(), "Cycle complete");
        for measurement in measurements {
            match measurement.result {
                Ok(spectrum) => sink.record(&measurement.name, &measurement.devices, &spectrum)?,
                Err(e) if e.is_busy() => debug!(name = %measurement.name, "Head busy, skipped this cycle"),
                Err(e) => warn!(name = %measurement.name, error = %e, "Acquisition failed"),
            }
        }
        if *stop.borrow() {
            break;
        }
    }

    info!(cycles, "Capture finished");
    Ok(())
}

async fn run_free(
    instruments: Vec<Instrument>,
    mut stop: watch::Receiver<bool>,
    count: Option<u64>,
    sink: &mut SpectrumSink,
) -> Result<()> {
    let (events_tx, mut events) = mpsc::channel(64);
    let handles: Vec<_> = instruments
        .into_iter()
        .enumerate()
        .map(|(device, instrument)| worker::spawn(device, instrument, events_tx.clone()))
        .collect();
    drop(events_tx);

    let mut received = 0u64;
    while count.is_none_or(|max| received < max) {
        tokio::select! {
            event = events.recv() => match event {
                Some(WorkerEvent::Spectrum { device, spectrum }) => {
                    received += 1;
                    let name = handles.get(device).map(|h| h.name().to_string()).unwrap_or_default();
                    sink.record(&name, &[device], &spectrum)?;
                }
                Some(WorkerEvent::Error { device, error }) => warn!(device, error = %error, "Worker cycle failed"),
                Some(WorkerEvent::Stopped { device }) => info!(device, "Worker stopped"),
                None => break,
            },
            _ = stop.changed() => break,
        }
    }

    // workers blocked on a full channel see it closed and exit
    drop(events);
    for handle in handles {
        let name = handle.name().to_string();
        match tokio::time::timeout(Duration::from_secs(5), handle.stop()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(%name, error = %e, "Worker ended abnormally"),
            Err(_) => warn!(%name, "Worker did not stop in time"),
        }
    }
    info!(spectra = received, "Capture finished");
    Ok(())
}

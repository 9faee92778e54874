use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use spectrovision_lib::{AcquisitionSettings, DeviceConfig, Instrument, IntegrationMode, PlotMode, Totals};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Take one spectrum from a spectroradiometer")]
struct Args {
    /// Serial number (full or the four-character short form) of the head to use
    #[arg(short, long)]
    serial: Option<String>,

    /// Acquisition settings as JSON
    #[arg(short = 'c', long)]
    settings: Option<PathBuf>,

    /// Fixed integration time in µs (disables auto-integration)
    #[arg(short, long)]
    integration: Option<u32>,

    /// Also write the spectrum as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the flat value list on one line instead of rows
    #[arg(long)]
    flat: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.verbose.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = match &args.settings {
        Some(path) => AcquisitionSettings::from_json_file(path)
            .with_context(|| format!("Failed to load settings from {:?}", path))?,
        None => AcquisitionSettings::default(),
    };
    if let Some(micros) = args.integration {
        settings.integration = IntegrationMode::Manual { micros };
    }

    let mut config = DeviceConfig::default();
    if let Some(serial) = &args.serial {
        config = config.with_serial(serial.clone());
    }

    let mut device = Instrument::connect(config).await.context("Failed to open spectroradiometer")?;
    eprintln!("Connected to {} ({})", device.name(), device.family());

    let rt = settings.plot_mode.is_reflectance();
    device.apply_settings(settings).await?;
    let spectrum = device.acquire(rt).await.context("Acquisition failed")?;

    if args.flat {
        let flat: Vec<String> = spectrum.to_flat().iter().map(|v| format!("{:.6}", v)).collect();
        println!("{}", flat.join(","));
    } else {
        for (nm, value) in spectrum.points() {
            println!("{} {:.6}", nm, value);
        }
        println!("# integration_us {}", spectrum.integration_us);
        if let Some(celsius) = device.last_temperature() {
            println!("# temperature_c {:.2}", celsius);
        }
        print_totals(&spectrum.totals, device.settings().plot_mode);
    }

    if let Some(path) = args.output {
        let json = serde_json::to_string_pretty(&spectrum)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
        eprintln!("Saved to {}", path.display());
    }

    Ok(())
}

fn print_totals(totals: &Totals, mode: PlotMode) {
    let rows: Vec<(&str, f64)> = match *totals {
        Totals::None => Vec::new(),
        Totals::Energy {
            total,
            fraction,
            red_far_red,
        } => vec![("total", total), ("fraction", fraction), ("red_far_red", red_far_red)],
        Totals::Photon {
            total,
            ppf,
            ypf,
            ppe,
            fraction,
            red_far_red,
        } => vec![
            ("total", total),
            ("ppf", ppf),
            ("ypf", ypf),
            ("ppe", ppe),
            ("fraction", fraction),
            ("red_far_red", red_far_red),
        ],
        Totals::Illuminance {
            total,
            fraction,
            red_far_red,
            illuminance,
        } => vec![
            ("total", total),
            ("fraction", fraction),
            ("red_far_red", red_far_red),
            ("illuminance", illuminance),
        ],
    };
    if !rows.is_empty() {
        println!("# mode {}", mode);
    }
    for (name, value) in rows {
        println!("# {} {:.6}", name, value);
    }
}

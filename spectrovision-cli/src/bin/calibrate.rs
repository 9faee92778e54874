use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use spectrovision_lib::calibration::LampTable;
use spectrovision_lib::{AcquisitionSettings, DeviceConfig, Instrument, IntegrationMode};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Maintain the calibration data stored on a spectroradiometer head")]
struct Cli {
    /// Serial number (full or short form) of the head to use
    #[arg(short, long, global = true)]
    serial: Option<String>,

    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and upload irradiance ratios from a reference lamp
    Lamp(LampConf),
    /// Delete the stored irradiance calibration
    ClearLamp,
    /// Hot pixel list related commands
    HotPixels(HotPixelCommand),
    /// Overwrite the pixel to wavelength polynomial
    Coefficients {
        /// Intercept, then first, second and third order terms
        #[arg(num_args = 4, allow_negative_numbers = true, required = true)]
        values: Vec<f32>,
    },
}

#[derive(Args)]
struct LampConf {
    /// Lamp file: `wavelength irradiance` rows, header lines are skipped
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    file: PathBuf,

    /// Integration time in µs for the calibration scan (auto when omitted)
    #[arg(short, long)]
    integration: Option<u32>,

    /// Scans to average for the calibration scan
    #[arg(short, long, default_value = "10")]
    average: u16,
}

#[derive(Args)]
struct HotPixelCommand {
    #[command(subcommand)]
    command: HotPixelCommands,
}

#[derive(Subcommand)]
enum HotPixelCommands {
    /// Mark pixels as hot
    Add {
        #[arg(required = true)]
        pixels: Vec<u16>,
    },
    /// Forget every hot pixel
    Clear,
    /// Print the stored list
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cli.verbose.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    let mut config = DeviceConfig::default();
    if let Some(serial) = cli.serial {
        config = config.with_serial(serial);
    }
    let mut device = Instrument::connect(config).await.context("Failed to open spectroradiometer")?;
    info!(name = %device.name(), family = %device.family(), "Connected");

    match cli.command {
        Commands::Lamp(conf) => calibrate_lamp(&mut device, conf).await?,
        Commands::ClearLamp => {
            device.clear_irradiance_calibration().await?;
            println!("Irradiance calibration deleted.");
        }
        Commands::HotPixels(HotPixelCommand { command }) => match command {
            HotPixelCommands::Add { pixels } => {
                device.add_hot_pixels(&pixels).await?;
                println!("{} hot pixel(s) stored.", device.hot_pixels().len());
            }
            HotPixelCommands::Clear => {
                device.clear_hot_pixels().await?;
                println!("Hot pixel list cleared.");
            }
            HotPixelCommands::Show => {
                let hot: Vec<String> = device.hot_pixels().iter().map(u16::to_string).collect();
                println!("{}", if hot.is_empty() { "none".to_string() } else { hot.join(" ") });
            }
        },
        Commands::Coefficients { values } => {
            let Ok(coeffs) = <[f32; 4]>::try_from(values.as_slice()) else {
                bail!("expected exactly four coefficients, got {}", values.len());
            };
            device.link().set_wavelength_coefficients(coeffs).await?;
            println!("Coefficients stored. Reconnect to use the new wavelength table.");
        }
    }

    Ok(())
}

async fn calibrate_lamp(device: &mut Instrument, conf: LampConf) -> Result<()> {
    let lamp = LampTable::from_file(&conf.file).with_context(|| format!("Failed to read lamp file {:?}", conf.file))?;
    info!(rows = lamp.len(), "Lamp table loaded");

    let integration = match conf.integration {
        Some(micros) => IntegrationMode::Manual { micros },
        None => IntegrationMode::Auto,
    };
    device
        .apply_settings(AcquisitionSettings {
            integration,
            scans_to_average: conf.average,
            ..Default::default()
        })
        .await?;

    println!("Taking calibration scan, keep the lamp steady...");
    let scan = device.take_calibration_scan().await?;
    device.calibrate_from_lamp(&lamp, &scan).await?;

    println!(
        "Calibration stored: {} points, {}-{} nm, reference integration {} µs",
        scan.values.len(),
        scan.grid.first,
        scan.grid.last,
        scan.integration_us
    );
    Ok(())
}

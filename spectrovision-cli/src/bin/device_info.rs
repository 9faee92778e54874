use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use spectrovision_lib::{DeviceConfig, Instrument, list_devices};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Show what a spectroradiometer head has stored")]
struct Args {
    /// Serial number (full or short form) of the head to query
    #[arg(short, long)]
    serial: Option<String>,

    /// Store a new alias on the head before printing (empty string deletes it)
    #[arg(long)]
    set_alias: Option<String>,

    /// Issue a USB reset before claiming the interface
    #[arg(long)]
    reset: bool,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
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
        .init();

    let heads = list_devices()?;
    println!("{} head(s) attached:", heads.len());
    for head in &heads {
        println!("  {}", head);
    }
    println!();

    let mut config = DeviceConfig::default();
    if let Some(serial) = args.serial {
        config = config.with_serial(serial);
    }
    if args.reset {
        config = config.reset_before_claim();
    }
    let mut device = Instrument::connect(config).await.context("Failed to open spectroradiometer")?;

    if let Some(alias) = args.set_alias {
        device.set_alias(&alias).await.context("Failed to store alias")?;
        println!("Alias updated.\n");
    }

    let serial = device.query_serial_number().await?;
    let temperature = device.read_temperature().await?;
    let baud = device.link().get_baud_rate().await?;
    let scans = device.link().get_scans_to_average().await?;

    println!("============================================================");
    println!("DEVICE INFORMATION");
    println!("============================================================");
    println!("Name:               {}", device.name());
    println!("Serial:             {}", serial);
    println!(
        "Alias:              {}",
        device.identity().alias.as_deref().unwrap_or("<not set>")
    );
    println!();
    println!("Family:             {}", device.family());
    println!("Output grid:        {}-{} nm", device.grid().first, device.grid().last);
    let [a0, a1, a2, a3] = device.coefficients().0;
    println!("Coefficients:       {} {} {} {}", a0, a1, a2, a3);
    println!(
        "Pixel range:        {:.2}-{:.2} nm",
        device.coefficients().wavelength(0),
        device.coefficients().wavelength(1023)
    );
    println!();
    let hot: Vec<String> = device.hot_pixels().iter().map(u16::to_string).collect();
    println!(
        "Hot pixels:         {}",
        if hot.is_empty() { "none".to_string() } else { hot.join(", ") }
    );
    match device.irradiance_calibration() {
        Some(calibration) => println!(
            "Irradiance cal:     {} ratios at {} µs",
            calibration.ratios.len(),
            calibration.reference_integration_us
        ),
        None => println!("Irradiance cal:     none"),
    }
    println!();
    println!("Temperature:        {:.2} °C", temperature);
    println!("Baud rate:          {}", baud);
    println!("Scans to average:   {}", scans);

    Ok(())
}

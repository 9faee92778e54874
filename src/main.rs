use clap::Parser;
use nusb::list_devices;
use spectrovision_lib::constants::{PID, VID};
use tracing::info;

/// List attached spectroradiometers, or every USB device with `--all`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show every USB device, not only spectroradiometer heads
    #[arg(short, long)]
    all: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    info!("Listing connected USB devices...\n");

    match list_devices() {
        Ok(devices) => {
            let mut count = 0;
            for device_info in devices {
                let is_head = device_info.vendor_id() == VID && device_info.product_id() == PID;
                if !cli.all && !is_head {
                    continue;
                }
                count += 1;
                info!(
                    "Device #{}: VID: {:#06x}, PID: {:#06x}, Bus: {:03}, Address: {:03}{}",
                    count,
                    device_info.vendor_id(),
                    device_info.product_id(),
                    device_info.bus_number(),
                    device_info.device_address(),
                    if is_head { " [spectroradiometer]" } else { "" }
                );
                info!(
                    "  Product: {}",
                    device_info.product_string().unwrap_or("<Not available>")
                );
                match device_info.serial_number() {
                    Some(serial) => {
                        info!("  Serial: {}", serial);
                        if is_head {
                            if let Some(short) = serial.get(2..6) {
                                info!("  Short serial: {}", short);
                            }
                        }
                    }
                    None => info!("  Serial: <Not available>"),
                }
                info!("  Speed: {:?}", device_info.speed());
                info!("---");
            }
            if count == 0 {
                info!("No spectroradiometer found.");
            }
        }
        Err(e) => {
            eprintln!("Error listing USB devices: {:?}", e);
        }
    }
}

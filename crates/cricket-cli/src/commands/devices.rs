//! Output device listing.

use clap::Args;
use cricket_io::{default_output_device, list_output_devices};

#[derive(Args)]
pub struct DevicesArgs {
    /// Show only the default device
    #[arg(long)]
    default: bool,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    if args.default {
        match default_output_device() {
            Some(device) => println!(
                "{} ({} Hz, {} ch)",
                device.name, device.default_sample_rate, device.channels
            ),
            None => println!("No default output device."),
        }
        return Ok(());
    }

    let devices = list_output_devices()?;
    if devices.is_empty() {
        println!("No audio devices found.");
        return Ok(());
    }

    let default_name = default_output_device().map(|d| d.name);
    println!("Output Devices");
    println!("==============\n");
    for (idx, device) in devices.iter().enumerate() {
        let marker = if default_name.as_deref() == Some(device.name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!(
            "  [{}] {} ({} Hz, {} ch){}",
            idx, device.name, device.default_sample_rate, device.channels, marker
        );
    }
    Ok(())
}

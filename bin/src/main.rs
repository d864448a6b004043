use std::path::PathBuf;

use autobright::{AutobrightBuilder, AutobrightConfig, AutobrightError, poll_interval_from_secs};

use clap::{ArgGroup, Parser};
use log::info;
use tokio::signal;

/// Adjust display and keyboard backlight brightness from the ambient light sensor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
            ArgGroup::new("mode")
                .args(["status", "once"]),
        ))]
struct Args {
    /// Read the configuration from this file instead of the default location
    #[arg(long, value_name = "path")]
    config: Option<PathBuf>,

    /// Print which sensor and keyboard backlight were found, then exit.
    #[arg(long)]
    status: bool,

    /// Run a single adjustment and print the ambient level as a percentage.
    #[arg(long)]
    once: bool,

    /// Seconds between adjustments.
    #[arg(long, value_name = "seconds")]
    interval: Option<f64>,

    /// Leave the display brightness alone.
    #[arg(long)]
    no_display: bool,

    /// Leave the keyboard backlight alone.
    #[arg(long)]
    no_keyboard: bool,
}

#[tokio::main]
async fn main() -> Result<(), AutobrightError> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AutobrightConfig::from_file(path).await?,
        None => AutobrightConfig::new().await?,
    };
    if let Some(interval) = args.interval {
        config.poll_interval = poll_interval_from_secs(interval)?;
    }
    config.adjust_display &= !args.no_display;
    config.adjust_keyboard &= !args.no_keyboard;

    let period = config.poll_interval();
    let cycle = config.cycle_config();

    let mut autobright = AutobrightBuilder::new().with_config(config).build().await?;
    let capabilities = autobright.capabilities();

    if args.status {
        println!(
            "sensor: {} ({})",
            autobright.sensor().name(),
            capabilities.sensor_available
        );
        println!(
            "keyboard: {} ({})",
            autobright.keyboard().name(),
            capabilities.keyboard_control_available
        );
        return Ok(());
    }

    if !capabilities.sensor_available {
        return Err(AutobrightError::Other("No ambient light sensor found".into()));
    }
    if cycle.adjust_keyboard && !capabilities.keyboard_control_available {
        info!("No keyboard backlight control found");
    }

    if args.once {
        let result = autobright.run_cycle(&cycle).await;
        match result.ambient {
            Some(ambient) => println!("{:?}", (ambient * 100.0).round()),
            None => return Err(AutobrightError::Other("Failed to read sensor".into())),
        }
        return Ok(());
    }

    autobright.start_loop(period);
    loop {
        let stop = tokio::select! {
            running = autobright.next_tick() => !running,
            _ = signal::ctrl_c() => true,
        };
        if stop {
            autobright.stop_loop();
            break;
        }
        let result = autobright.run_cycle(&cycle).await;
        if let Some(target) = result.display_target {
            info!("display -> {:.0}%", target * 100.0);
        }
        if let Some(target) = result.keyboard_target {
            info!("keyboard -> {:.0}%", target * 100.0);
        }
    }

    Ok(())
}

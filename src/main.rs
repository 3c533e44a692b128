//! Command line entry point: parses the device endpoint, builds the
//! matching reader once, then streams readings to stdout as CSV.

use std::time::Duration;

use clap::Parser;
use shelly_power_reader::{DeviceEndpoint, Generation, Poller, ShellyReader};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "shelly-power-reader")]
#[command(about = "Read power values from Shelly devices")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// IP address of the shelly device
    #[arg(long, short)]
    ip: String,

    /// Password of the shelly device
    #[arg(long, short)]
    password: Option<String>,

    /// The generation of the shelly device, one of: [1, 2+].
    /// Gen1 uses the Http API, Gen2+ uses RPC.
    #[arg(long, short, default_value = "2+")]
    generation: Generation,

    /// Polling interval in seconds
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let endpoint = DeviceEndpoint {
        host: cli.ip.clone(),
        password: cli.password,
        generation: cli.generation,
    };
    info!(host = %endpoint.host, generation = %endpoint.generation, "starting shelly power reader");

    // The reader is fully constructed before the poller starts, so no
    // "am I initialized yet" state is needed anywhere.
    let reader = ShellyReader::for_endpoint(&endpoint);
    let (reading_tx, mut reading_rx) = mpsc::channel(32);
    Poller::new(reader, reading_tx, Duration::from_secs(cli.interval)).spawn();

    println!("ip,timestamp,power,energy");
    while let Some(reading) = reading_rx.recv().await {
        println!(
            "{},{},{},{}",
            cli.ip, reading.timestamp, reading.power, reading.total
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from([
            "shelly-power-reader",
            "--ip",
            "192.168.1.40",
            "--interval",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_generation_and_interval_defaults() {
        let cli = Cli::try_parse_from(["shelly-power-reader", "--ip", "192.168.1.40"]).unwrap();
        assert_eq!(cli.generation, Generation::Gen2Plus);
        assert_eq!(cli.interval, 1);

        let cli =
            Cli::try_parse_from(["shelly-power-reader", "-i", "192.168.1.40", "-g", "1"]).unwrap();
        assert_eq!(cli.generation, Generation::Gen1);
    }
}

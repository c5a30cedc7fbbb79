use infinitude::{Config, InfinitudeClient};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> infinitude::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let builder = match args.get(1) {
        Some(host) => InfinitudeClient::builder(host),
        None => Config::from_env()?.builder(),
    };

    let mut client = builder
        .on_snapshot(|zone| {
            println!(
                "[{}] {} ({:.0}% RH) | {:?} {:?} | target {} | fan: {} | preset: {}",
                zone.name,
                zone.current_temperature,
                zone.current_humidity,
                zone.operating_mode,
                zone.hvac_action,
                zone.target_temperature(),
                zone.fan_mode.as_display_str(),
                zone.preset,
            );
            if let Some(next) = &zone.schedule.next {
                println!("    next: {} at {}", next.activity, next.start);
            }
        })
        .build()?;

    let zones = client.discover_zones().await?;
    println!("Enabled zones: {zones:?}. Polling for updates...");

    loop {
        if let Err(e) = client.refresh().await {
            eprintln!("Refresh error: {e}");
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}

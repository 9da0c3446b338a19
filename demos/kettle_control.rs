use btleplug::{
    api::{Central, Manager as _, Peripheral as _, ScanFilter},
    platform::{Manager, Peripheral},
};
use brewlink::{
    kettle::{ScheduleMode, TemperatureUnit},
    BtleplugTransport, KettleConfig, KettleDevice, STAGG_NAME_PATTERNS,
};
use std::{error::Error, time::Duration};
use tokio::time::sleep;
use tracing::info;

async fn find_kettle() -> Result<Peripheral, Box<dyn Error>> {
    let manager = Manager::new().await?;
    let central = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or("No Bluetooth adapter found")?;

    central.start_scan(ScanFilter::default()).await?;
    sleep(Duration::from_secs(5)).await;
    central.stop_scan().await?;

    for peripheral in central.peripherals().await? {
        let name = peripheral
            .properties()
            .await?
            .and_then(|p| p.local_name)
            .unwrap_or_default();
        if STAGG_NAME_PATTERNS.iter().any(|pattern| name.contains(pattern)) {
            info!("Found kettle: {}", name);
            return Ok(peripheral);
        }
    }
    Err("No Stagg kettle found".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let peripheral = find_kettle().await?;
    peripheral.connect().await?;

    let kettle = KettleDevice::with_config(
        BtleplugTransport::stagg(peripheral).await?,
        KettleConfig::two_phase(),
    );
    let state = kettle.connect().await?;
    info!("Target {}{}, hold {} min", state.target_temperature, state.units, state.hold_time);
    info!("Altitude {} m, schedule {}", state.altitude_m, state.schedule_mode);

    kettle.subscribe(|state| {
        info!("Kettle update: target {}, counter {}", state.target_temperature, state.counter);
    });

    kettle.set_units(TemperatureUnit::Celsius).await?;
    kettle.set_temperature(93.5).await?;
    kettle.set_hold_time(15).await?;
    kettle.set_schedule(ScheduleMode::Daily, 6, 30, 94.0).await?;

    sleep(Duration::from_secs(2)).await;
    kettle.disconnect().await?;
    Ok(())
}

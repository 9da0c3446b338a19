use btleplug::{
    api::{Central, Manager as _, Peripheral as _, ScanFilter},
    platform::{Manager, Peripheral},
};
use brewlink::{BtleplugTransport, ScaleDevice, ACAIA_NAME_PATTERNS, ACAIA_SERVICE_UUID};
use std::{error::Error, time::Duration};
use tokio::time::sleep;
use tracing::{error, info};

async fn find_scale() -> Result<Peripheral, Box<dyn Error>> {
    let manager = Manager::new().await?;
    let central = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or("No Bluetooth adapter found")?;

    central
        .start_scan(ScanFilter {
            services: vec![ACAIA_SERVICE_UUID],
        })
        .await?;
    sleep(Duration::from_secs(5)).await;
    central.stop_scan().await?;

    for peripheral in central.peripherals().await? {
        let name = peripheral
            .properties()
            .await?
            .and_then(|p| p.local_name)
            .unwrap_or_default();
        if ACAIA_NAME_PATTERNS
            .iter()
            .any(|pattern| name.to_uppercase().contains(pattern))
        {
            info!("Found scale: {}", name);
            return Ok(peripheral);
        }
    }
    Err("No Acaia scale found".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let peripheral = find_scale().await?;
    peripheral.connect().await?;

    let scale = ScaleDevice::new(BtleplugTransport::acaia(peripheral).await?);
    if let Err(e) = scale.connect().await {
        error!("Handshake failed: {}", e);
        return Err(e.into());
    }

    scale.subscribe(|session| {
        info!(
            "{:>7.1} g  {:>5.1} s  battery {:?}  {}",
            session.weight,
            session.timer,
            session.battery,
            session.phase()
        );
    });

    scale.tare().await?;
    sleep(Duration::from_secs(1)).await;
    scale.start_timer().await?;

    info!("Recording for 30 seconds...");
    sleep(Duration::from_secs(30)).await;

    scale.stop_timer().await?;
    let session = scale.session();
    info!("Recorded {} samples", session.samples.len());
    for sample in &session.samples {
        info!("  t={:.1}s w={:.1}g", sample.t, sample.w);
    }

    scale.disconnect().await?;
    Ok(())
}

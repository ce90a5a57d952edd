//! Print pushed events over UDP, reconnecting when keep-alive gives up

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zkwire::{Device, DeviceConfig, RealTimeEvent, TransportError, TransportKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());
    let config = DeviceConfig::new(ip)
        .with_transport(TransportKind::Udp)
        .with_keep_alive(true);

    loop {
        let device = Device::with_config(config.clone());
        let (lost_tx, mut lost_rx) = mpsc::unbounded_channel();

        let connected = device
            .create_socket(Some(Box::new(move |e: TransportError| {
                let _ = lost_tx.send(e);
            })))
            .await?;
        if !connected {
            sleep_before_retry().await;
            continue;
        }

        let mut print_event = |event: RealTimeEvent| {
            match &event {
                RealTimeEvent::AttendanceLog { user_serial, timestamp, .. } => {
                    println!("attendance: user {} at {}", user_serial, timestamp);
                }
                RealTimeEvent::FingerprintVerify { user_serial: None } => {
                    println!("finger rejected");
                }
                other => println!("{:?}", other),
            }
            ControlFlow::Continue(())
        };

        tokio::select! {
            result = device.get_real_time_logs(&mut print_event) => {
                if let Err(e) = result {
                    warn!("Listening stopped: {} ({})", e, e.kind());
                }
            }
            Some(e) = lost_rx.recv() => info!("Link lost: {}", e),
        }

        let _ = device.disconnect().await;
        sleep_before_retry().await;
    }
}

async fn sleep_before_retry() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

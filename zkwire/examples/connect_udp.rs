//! Read users and the attendance log over UDP

use tracing_subscriber::EnvFilter;
use zkwire::{Attendance, Device};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());

    println!("Connecting to {} via UDP...", ip);
    let device = Device::new_udp(ip, 4370);
    device.connect().await?;

    let info = device.get_info().await?;
    println!("{}", info);

    let users = device.get_users().await?;
    for user in &users {
        println!("  user {:>5}  {:<24} {}", user.uid, user.name, user.user_id);
    }

    let mut count = 0usize;
    let records = device
        .get_attendances(&mut |_: &Attendance| count += 1)
        .await?;
    if let Some(last) = records.last() {
        println!("{} records, last: {} at {}", count, last.user_id, last.record_time);
    }

    device.disconnect().await?;
    Ok(())
}

//! Enroll a user with a weekday schedule, then pulse the door

use std::time::Duration;

use chrono::Weekday;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;
use zkwire::{
    DaySegment, Device, GroupTimezoneWrite, Role, TimezoneWrite, UserGroupWrite, UserWrite,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let ip = std::env::var("DEVICE_IP").unwrap_or_else(|_| "192.168.1.201".to_string());

    let device = Device::new(ip, 4370);
    if !device.connect().await? {
        anyhow::bail!("device refused the connection");
    }

    device.disable_device().await?;

    let office_hours = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
        .into_iter()
        .fold(TimezoneWrite::new(2), |tz, day| {
            tz.with_day(day, DaySegment::new(8, 0, 18, 0))
        });
    device.set_timezone(&office_hours).await?;

    device
        .set_group_timezones(&GroupTimezoneWrite::new(3).with_timezones([2, 0, 0]))
        .await?;

    let user = UserWrite::new(501)
        .with_user_id("501")
        .with_name("Front Desk")
        .with_role(Role::User)
        .with_group_number(3);
    device.set_user(&user).await?;
    device.set_user_group(&UserGroupWrite::new(501, 3)).await?;

    device.refresh_data().await?;
    device.enable_device().await?;

    println!("Opening door...");
    device.open_door().await?;
    sleep(Duration::from_secs(3)).await;

    device.disconnect().await?;
    Ok(())
}

use crate::config::{TIMESTAMP_PATTERN, TIMEZONE};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use embassy_sync::once_lock::OnceLock;
use embassy_time::Instant;

pub fn get_uptime_string() -> String {
    format_uptime(Instant::now().as_millis())
}

fn format_uptime(millis: u64) -> String {
    format!("[{:>4}.{:03}s]", millis / 1_000, millis % 1_000)
}

pub fn get_formatted_timestamp() -> String {
    format_timestamp(Utc::now())
}

fn format_timestamp(now: DateTime<Utc>) -> String {
    now.with_timezone(cached_timezone())
        .format(TIMESTAMP_PATTERN)
        .to_string()
}

fn cached_timezone() -> &'static Tz {
    static TZ: OnceLock<Tz> = OnceLock::new();
    TZ.get_or_init(|| parse_timezone(TIMEZONE))
}

fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or(chrono_tz::UTC)
}

#[cfg(target_os = "espidf")]
pub use sntp::setup_sntp;

#[cfg(target_os = "espidf")]
mod sntp {
    use anyhow::Context;
    use embassy_time::Timer;
    use esp_idf_svc::sntp::{EspSntp, SyncStatus};
    use log::{info, warn};

    const MAX_WAIT_CYCLES: u32 = 100;

    /// Starts SNTP and waits up to ten seconds for the first sync. The client
    /// keeps syncing in the background while the returned handle is alive.
    pub async fn setup_sntp() -> anyhow::Result<EspSntp<'static>> {
        let sntp = EspSntp::new_default().context("‼️ Failed to init SNTP")?;
        info!("\x1b[38;5;27m ⏳ Time sync in progress...");

        let mut wait_cycles = 0;
        while sntp.get_sync_status() != SyncStatus::Completed {
            if wait_cycles >= MAX_WAIT_CYCLES {
                warn!("\x1b[38;5;11m ⏳ SNTP sync timed out, timestamps use system time for now");
                return Ok(sntp);
            }
            Timer::after_millis(100).await;
            wait_cycles += 1;
        }

        info!("\x1b[38;5;27m ⏳ Time is synchronized");
        Ok(sntp)
    }
}

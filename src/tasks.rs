use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Delay, Duration, Instant, Timer};
use esp_idf_svc::hal::i2c::I2cDriver;
use esp_idf_svc::sntp::EspSntp;
use little_paw::config::{SENSOR_POLL_INTERVAL_MS, UPLOAD_INTERVAL_SECS, WIFI_PASS, WIFI_SSID};
use little_paw::logging::{LogLevel, log_measurement, log_message, log_sensor_error};
use little_paw::models::Measurement;
use little_paw::network::NetworkManager;
use little_paw::network::esp::EspPlatform;
use little_paw::schedule::UploadSchedule;
use little_paw::sensors::Aht20;
use little_paw::time_utils::setup_sntp;
use little_paw::upload::{Backoff, EspHttpPost, UploadOutcome, Uploader};
use log::{error, info, warn};

pub(crate) type Sensor = Aht20<I2cDriver<'static>, Delay>;
pub(crate) type Network = NetworkManager<EspPlatform>;

pub static MEASUREMENT_CHANNEL: Channel<CriticalSectionRawMutex, Measurement, 2> = Channel::new();

#[embassy_executor::task]
pub(crate) async fn sensor_task(mut sensor: Sensor) {
    let mut schedule = UploadSchedule::new(Duration::from_secs(UPLOAD_INTERVAL_SECS));

    loop {
        match sensor.measure() {
            Ok(measurement) => {
                log_measurement(&measurement);

                let now = Instant::now();
                if schedule.is_due(now) && MEASUREMENT_CHANNEL.try_send(measurement).is_ok() {
                    schedule.mark_sent(now);
                }
            }
            Err(e) => log_sensor_error("AHT20", e),
        }
        Timer::after(Duration::from_millis(SENSOR_POLL_INTERVAL_MS)).await;
    }
}

#[embassy_executor::task]
pub(crate) async fn network_task(
    network: &'static mut Network,
    mut uploader: Uploader<EspHttpPost>,
) {
    let mut sntp = None;
    if ensure_connected(network).await {
        sntp = start_sntp().await;
    }
    let mut backoff = Backoff::new();

    info!("📡 Network Task: Ready.");

    loop {
        let measurement = MEASUREMENT_CHANNEL.receive().await;

        if !ensure_connected(network).await {
            log_message(LogLevel::Warn, "📡 Network: Offline, reading dropped");
            continue;
        }
        if sntp.is_none() {
            sntp = start_sntp().await;
        }

        match uploader.upload(&measurement) {
            Ok(UploadOutcome::Accepted(status)) => {
                info!("📡 Network: Data posted (Status {})", status);
                backoff.reset();
            }
            Ok(UploadOutcome::RateLimited) => {
                let cool_down = backoff.escalate();
                warn!(
                    "📡 Network: Rate limited (429). Cooling down for {}s...",
                    cool_down.as_secs()
                );
                Timer::after(cool_down).await;
            }
            Ok(UploadOutcome::Rejected(status)) => {
                error!("📡 Network: Server error (Status {})", status)
            }
            Err(error) => {
                error!("📡‼️ Network: Critical failure: {:?}", error);
                Timer::after(Duration::from_secs(10)).await;
            }
        }
    }
}

async fn ensure_connected(network: &mut Network) -> bool {
    if network.is_connected() {
        return true;
    }
    match network.connect(WIFI_SSID, WIFI_PASS).await {
        Ok(address) => {
            info!("📶 WiFi Connected! IP: {}", address);
            true
        }
        Err(e) => {
            error!("📶‼️ {}", e);
            false
        }
    }
}

async fn start_sntp() -> Option<EspSntp<'static>> {
    match setup_sntp().await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("‼️ SNTP unavailable: {:?}", e);
            None
        }
    }
}

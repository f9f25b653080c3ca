#[cfg(target_os = "espidf")]
mod tasks;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("little-paw only runs on ESP-IDF targets; use `cargo test` on the host")
}

#[cfg(target_os = "espidf")]
mod firmware {
    use crate::tasks::{Network, network_task, sensor_task};
    use anyhow::Context;
    use embassy_executor::Executor;
    use embassy_time::Delay;
    use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::units::Hertz;
    use esp_idf_svc::log::EspLogger;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::link_patches;
    use little_paw::config::{BACKEND_URL, DEVICE_SECRET, I2C_BAUDRATE};
    use little_paw::logging::print_splash_screen;
    use little_paw::network::esp::EspPlatform;
    use little_paw::network::{NetworkManager, NetworkSettings};
    use little_paw::sensors::Aht20;
    use little_paw::upload::{EspHttpPost, Uploader};
    use log::{error, info, warn};
    use static_cell::StaticCell;

    static EXECUTOR: StaticCell<Executor> = StaticCell::new();
    static NETWORK: StaticCell<Network> = StaticCell::new();

    pub(crate) fn run() -> anyhow::Result<()> {
        link_patches();
        EspLogger::initialize_default();
        print_splash_screen();

        let peripherals = Peripherals::take().context("‼️ Failed to take Peripherals")?;
        let nvs = EspDefaultNvsPartition::take().context("‼️ Failed to take NVS partition")?;

        let i2c_config = I2cConfig::new().baudrate(Hertz::from(I2C_BAUDRATE));
        let i2c_driver = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio21,
            peripherals.pins.gpio22,
            &i2c_config,
        )
        .context("‼️ Failed to initialize I2C Driver")?;

        let mut sensor = Aht20::new(i2c_driver, Delay);
        sensor.reset().context("‼️ Failed to reset AHT20")?;
        sensor.initialize().context("‼️ Failed to init AHT20")?;
        info!("\x1b[38;5;27m✅ Sensor initialized successfully!\x1b[0m");

        let mut network = NetworkManager::new(
            EspPlatform::new(peripherals.modem, Some(nvs)),
            NetworkSettings::default(),
        );
        network.init().context("‼️ Failed to bring up WiFi")?;
        let network = NETWORK.init(network);

        let uploader = if BACKEND_URL.is_empty() {
            warn!("📡 BACKEND_URL is not set, uploads are disabled");
            None
        } else {
            let client = EspHttpPost::new()?;
            Some(Uploader::new(client, BACKEND_URL, DEVICE_SECRET))
        };

        let executor = EXECUTOR.init(Executor::new());
        executor.run(|spawner| {
            match sensor_task(sensor) {
                Ok(token) => spawner.spawn(token),
                Err(e) => error!("‼️ Could not spawn sensor task: {:?}", e),
            }
            if let Some(uploader) = uploader {
                match network_task(network, uploader) {
                    Ok(token) => spawner.spawn(token),
                    Err(e) => error!("‼️ Could not spawn network task: {:?}", e),
                }
            }
        })
    }
}

/// Reads a value baked in by `build.rs`, falling back to `""` so host builds
/// without a `.env` still compile.
macro_rules! build_env {
    ($key:literal) => {
        match option_env!($key) {
            Some(value) => value,
            None => "",
        }
    };
}

pub const WIFI_SSID: &str = build_env!("WIFI_SSID");
pub const WIFI_PASS: &str = build_env!("WIFI_PASS");
pub const BACKEND_URL: &str = build_env!("BACKEND_URL");
pub const DEVICE_SECRET: &str = build_env!("DEVICE_SECRET");
pub const TIMEZONE: &str = build_env!("TIMEZONE");

/// NUL-terminated PEM, empty when no certificate was configured.
pub const BACKEND_CA_CERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/backend_ca.pem"));

pub const DEVICE_SECRET_HEADER: &str = "X-Device-Secret";

pub const SENSOR_POLL_INTERVAL_MS: u64 = 2_000;
pub const UPLOAD_INTERVAL_SECS: u64 = 60 * 60;
pub const HTTP_TIMEOUT_SECS: u64 = 15;

pub const WIFI_MAX_RETRIES: u8 = 3;

pub const TIMESTAMP_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

pub const I2C_BAUDRATE: u32 = 100_000;
pub const AHT20_ADDRESS: u8 = 0x38;

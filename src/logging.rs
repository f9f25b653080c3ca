use crate::models::Measurement;
use crate::time_utils::{get_formatted_timestamp, get_uptime_string};
use log::{error, info, warn};

const SPLASH_SCREEN: &str = r#"
  _ _ _   _   _
 | (_) |_| |_| | ___       _ __   __ ___      __
 | | | __| __| |/ _ \_____| '_ \ / _` \ \ /\ / /
 | | | |_| |_| |  __/_____| |_) | (_| |\ V  V /
 |_|_|\__|\__|_|\___|     | .__/ \__,_| \_/\_/
                          |_|                   "#;

pub enum LogLevel {
    Info,
    Warn,
    Error,
}

pub fn print_splash_screen() {
    info!("{}", SPLASH_SCREEN);
}

pub fn log_measurement(measurement: &Measurement) {
    log_message(LogLevel::Info, &measurement_line(measurement));
}

pub fn log_sensor_error(sensor_name: &str, error: impl std::fmt::Debug) {
    log_message(
        LogLevel::Error,
        &format!("🚫 {} Error: {:?}", sensor_name, error),
    );
}

pub fn log_message(level: LogLevel, message: &str) {
    let prefix = format!("{} [{}]", get_uptime_string(), get_formatted_timestamp());

    match level {
        LogLevel::Error => error!("\x1b[31m{} {}\x1b[0m", prefix, message),
        LogLevel::Warn => warn!("\x1b[38;5;11m{} {}\x1b[0m", prefix, message),
        LogLevel::Info => info!("\x1b[38;5;40m{} {}\x1b[0m", prefix, message),
    }
}

fn measurement_line(measurement: &Measurement) -> String {
    format!(
        "[ 🌡️ Temp {:.2}F ({:.2}C) | 💧Humidity {:.2}% ]",
        measurement.temp_fahrenheit,
        measurement.temp_celsius(),
        measurement.humidity_percentage
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_line_shows_both_scales() {
        let line = measurement_line(&Measurement::from_celsius(20.0, 55.5));
        assert_eq!(line, "[ 🌡️ Temp 68.00F (20.00C) | 💧Humidity 55.50% ]");
    }
}

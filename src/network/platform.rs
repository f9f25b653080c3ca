//! Seams between the lifecycle manager and the radio SDK.

use super::error::DriverError;
use super::event::{EventSink, EventSource};
use heapless::String;
use log::warn;

pub const SSID_MAX_LEN: usize = 32;
pub const PASSWORD_MAX_LEN: usize = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PowerSave {
    /// Radio stays awake; lowest latency.
    #[default]
    None,
    MinModem,
    MaxModem,
}

/// Station-mode credentials. Oversized input is truncated at the last UTF-8
/// character boundary that fits, never rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationConfig {
    pub ssid: String<SSID_MAX_LEN>,
    pub password: String<PASSWORD_MAX_LEN>,
}

impl StationConfig {
    pub fn new(ssid: &str, password: &str) -> Self {
        let config = Self {
            ssid: truncated(ssid),
            password: truncated(password),
        };

        if config.ssid.len() < ssid.len() {
            warn!(
                "📶 SSID is {} bytes, truncated to `{}`",
                ssid.len(),
                config.ssid
            );
        }
        if config.password.len() < password.len() {
            warn!(
                "📶 Password is {} bytes, truncated to {} bytes",
                password.len(),
                config.password.len()
            );
        }

        config
    }
}

fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for c in value.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Issues a connect request from the event-dispatch context.
pub trait LinkControl: Send + Sync + 'static {
    fn reconnect(&self) -> Result<(), DriverError>;
}

/// Process-wide network bring-up: stack, event loop, observers, station.
pub trait WifiPlatform {
    type Station: Station;
    /// Keeps an observer registered while alive.
    type Subscription;
    type Link: LinkControl;

    fn link_control(&self) -> Self::Link;

    fn init_netif_stack(&mut self) -> Result<(), DriverError>;

    fn create_event_loop(&mut self) -> Result<(), DriverError>;

    fn subscribe(
        &mut self,
        source: EventSource,
        sink: EventSink,
    ) -> Result<Self::Subscription, DriverError>;

    fn unsubscribe(&mut self, subscription: Self::Subscription) -> Result<(), DriverError>;

    /// Creates the station netif and initializes the WiFi driver behind it.
    fn create_station(&mut self) -> Result<Self::Station, DriverError>;
}

/// Station interface together with the driver it is attached to.
pub trait Station {
    fn configure(&mut self, config: &StationConfig) -> Result<(), DriverError>;

    fn set_power_save(&mut self, mode: PowerSave) -> Result<(), DriverError>;

    fn start(&mut self) -> Result<(), DriverError>;

    fn connect(&mut self) -> Result<(), DriverError>;

    fn disconnect(&mut self) -> Result<(), DriverError>;

    fn stop(&mut self) -> Result<(), DriverError>;

    /// Releases the driver and destroys the interface.
    fn deinit(self) -> Result<(), DriverError>;
}

//! WiFi station connection lifecycle.
//!
//! The platform delivers connectivity events as [`NetworkEvent`] messages on
//! its own event-dispatch task. A shared [`LinkMachine`] decides how to react
//! (reconnect, or conclude the running attempt), and [`NetworkManager::connect`]
//! awaits a per-attempt [`ConnectSignal`] for the conclusion.

mod dispatch;
mod error;
mod event;
mod manager;
mod platform;
mod state;

#[cfg(target_os = "espidf")]
pub mod esp;


pub use dispatch::ConnectSignal;
pub use error::{DriverError, InitStage, NetworkError};
pub use event::{EventSink, EventSource, NetworkEvent};
pub use manager::{NetworkManager, NetworkSettings};
pub use platform::{
    LinkControl, PASSWORD_MAX_LEN, PowerSave, SSID_MAX_LEN, Station, StationConfig, WifiPlatform,
};
pub use state::{ConnectOutcome, LinkAction, LinkMachine, LinkState, RetryPolicy};

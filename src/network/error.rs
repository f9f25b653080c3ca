use core::fmt;
use embassy_time::Duration;
use thiserror::Error;

/// Raw status code returned by the radio/netif driver, kept verbatim.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("driver returned code {code} ({code:#x})")]
pub struct DriverError {
    code: i32,
}

impl DriverError {
    /// `ESP_FAIL`
    pub const FAIL: Self = Self::from_code(-1);
    /// `ESP_ERR_INVALID_STATE`
    pub const INVALID_STATE: Self = Self::from_code(0x103);

    pub const fn from_code(code: i32) -> Self {
        Self { code }
    }

    pub const fn code(&self) -> i32 {
        self.code
    }
}

#[cfg(target_os = "espidf")]
impl From<esp_idf_svc::sys::EspError> for DriverError {
    fn from(error: esp_idf_svc::sys::EspError) -> Self {
        Self::from_code(error.code())
    }
}

/// Sub-step of [`NetworkManager::init`](super::NetworkManager::init), in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitStage {
    NetifStack,
    EventLoop,
    EventHandlers,
    StationInterface,
}

impl InitStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetifStack => "netif stack",
            Self::EventLoop => "event loop",
            Self::EventHandlers => "event handlers",
            Self::StationInterface => "station interface",
        }
    }
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum NetworkError {
    #[error("network init failed at {stage}: {source}")]
    Init {
        stage: InitStage,
        #[source]
        source: DriverError,
    },
    #[error("could not connect to `{ssid}` after {retries} retries")]
    ConnectFailed { ssid: String, retries: u8 },
    #[error("no connection outcome within {}ms", .0.as_millis())]
    ConnectTimeout(Duration),
    #[error("network stack is not initialized")]
    NotInitialized,
    #[error("network stack is already initialized")]
    AlreadyInitialized,
    #[error("wifi driver error: {0}")]
    Driver(#[from] DriverError),
}

impl NetworkError {
    pub(crate) fn init(stage: InitStage, source: DriverError) -> Self {
        Self::Init { stage, source }
    }
}

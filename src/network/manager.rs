use super::dispatch::{AttemptStart, Dispatcher};
use super::error::{DriverError, InitStage, NetworkError};
use super::event::EventSource;
use super::platform::{PowerSave, Station, StationConfig, WifiPlatform};
use super::state::{ConnectOutcome, LinkState, RetryPolicy};
use crate::config::WIFI_MAX_RETRIES;
use embassy_time::{Duration, with_timeout};
use log::{error, info, warn};
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Disconnect-triggered reconnects before an attempt fails.
    pub max_retries: u8,
    /// `None` waits until the retry budget decides the attempt.
    pub connect_timeout: Option<Duration>,
    pub power_save: PowerSave,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_retries: WIFI_MAX_RETRIES,
            connect_timeout: None,
            power_save: PowerSave::None,
        }
    }
}

/// Everything `init` acquires. Fields fill in as init progresses, so a
/// failed init leaves a partial session for `deinit` to reclaim.
struct Session<P: WifiPlatform> {
    dispatcher: Arc<Dispatcher<P::Link>>,
    link_events: Option<P::Subscription>,
    address_events: Option<P::Subscription>,
    station: Option<P::Station>,
}

impl<P: WifiPlatform> Session<P> {
    fn new(dispatcher: Arc<Dispatcher<P::Link>>) -> Self {
        Self {
            dispatcher,
            link_events: None,
            address_events: None,
            station: None,
        }
    }
}

/// WiFi station lifecycle: `init → (connect ⇄ disconnect)* → deinit`.
pub struct NetworkManager<P: WifiPlatform> {
    platform: P,
    settings: NetworkSettings,
    session: Option<Session<P>>,
}

impl<P: WifiPlatform> NetworkManager<P> {
    pub fn new(platform: P, settings: NetworkSettings) -> Self {
        Self {
            platform,
            settings,
            session: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.session
            .as_ref()
            .map_or(LinkState::Uninitialized, |s| s.dispatcher.state())
    }

    pub fn retry_count(&self) -> u8 {
        self.session
            .as_ref()
            .map_or(0, |s| s.dispatcher.retry_count())
    }

    pub fn address(&self) -> Option<IpAddr> {
        self.session.as_ref().and_then(|s| s.dispatcher.address())
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Brings up the netif stack, the event loop, both observers and the
    /// station interface. Call at most once per `deinit` cycle.
    ///
    /// A failure leaves whatever was already acquired in place; call
    /// [`deinit`](Self::deinit) to reclaim it before retrying.
    pub fn init(&mut self) -> Result<(), NetworkError> {
        if self.session.is_some() {
            return Err(NetworkError::AlreadyInitialized);
        }

        let dispatcher = Arc::new(Dispatcher::new(
            self.platform.link_control(),
            RetryPolicy::new(self.settings.max_retries),
        ));
        let session = self.session.insert(Session::new(dispatcher));

        self.platform
            .init_netif_stack()
            .map_err(init_failure(InitStage::NetifStack))?;

        self.platform
            .create_event_loop()
            .map_err(init_failure(InitStage::EventLoop))?;

        let link_sink = session.dispatcher.sink();
        session.link_events = Some(
            self.platform
                .subscribe(EventSource::Link, link_sink)
                .map_err(init_failure(InitStage::EventHandlers))?,
        );
        let address_sink = session.dispatcher.sink();
        session.address_events = Some(
            self.platform
                .subscribe(EventSource::Address, address_sink)
                .map_err(init_failure(InitStage::EventHandlers))?,
        );

        session.station = Some(
            self.platform
                .create_station()
                .map_err(init_failure(InitStage::StationInterface))?,
        );

        session.dispatcher.mark_initialized();
        info!("📶 Network stack initialized");
        Ok(())
    }

    /// Joins `ssid` and waits for an address.
    ///
    /// SSID and password are truncated to 32 and 64 bytes. Without a
    /// configured `connect_timeout` this only returns once an address is
    /// assigned or the retry budget runs out. Calling it while connected
    /// returns the current address without touching the driver.
    pub async fn connect(&mut self, ssid: &str, password: &str) -> Result<IpAddr, NetworkError> {
        let NetworkSettings {
            connect_timeout,
            power_save,
            ..
        } = self.settings;
        let session = self.ready_session()?;

        let (signal, link_started) = match session.dispatcher.begin_attempt() {
            AttemptStart::AlreadyConnected(address) => {
                info!("📶 Already connected with IP {}", address);
                return Ok(address);
            }
            AttemptStart::Started {
                signal,
                link_started,
            } => (signal, link_started),
        };

        let config = StationConfig::new(ssid, password);
        info!("📶 Connecting to WiFi network: {}", config.ssid);

        let Some(station) = session.station.as_mut() else {
            return Err(NetworkError::NotInitialized);
        };
        if let Err(e) = request_link(station, &config, power_save, link_started) {
            error!("📶 WiFi connect request failed: {}", e);
            session.dispatcher.halt();
            return Err(e.into());
        }

        let outcome = match connect_timeout {
            None => signal.wait().await,
            Some(limit) => match with_timeout(limit, signal.wait()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    session.dispatcher.abandon_attempt();
                    if let Err(e) = station.disconnect() {
                        warn!("📶 Disconnect after timeout failed: {}", e);
                    }
                    error!(
                        "📶 No answer from `{}` within {}ms",
                        config.ssid,
                        limit.as_millis()
                    );
                    return Err(NetworkError::ConnectTimeout(limit));
                }
            },
        };

        match outcome {
            ConnectOutcome::Connected(address) => {
                info!("📶 Connected to WiFi network: {} (IP {})", config.ssid, address);
                Ok(address)
            }
            ConnectOutcome::Failed => {
                let retries = session.dispatcher.retry_count();
                error!("📶 Failed to connect to WiFi network: {}", config.ssid);
                Err(NetworkError::ConnectFailed {
                    ssid: config.ssid.as_str().into(),
                    retries,
                })
            }
        }
    }

    /// Drops the pending connect signal and asks the driver to leave the AP.
    /// Observers and the station interface stay registered.
    pub fn disconnect(&mut self) -> Result<(), NetworkError> {
        let session = self.ready_session()?;
        session.dispatcher.halt();

        let Some(station) = session.station.as_mut() else {
            return Err(NetworkError::NotInitialized);
        };
        station.disconnect()?;
        info!("📶 WiFi disconnected");
        Ok(())
    }

    /// Releases everything `init` acquired, including the leftovers of a
    /// failed init. Returns `NotInitialized` when the WiFi driver was never
    /// brought up; otherwise every step runs and the first driver error is
    /// reported.
    pub fn deinit(&mut self) -> Result<(), NetworkError> {
        let Some(session) = self.session.take() else {
            error!("📶 WiFi stack not initialized");
            return Err(NetworkError::NotInitialized);
        };
        session.dispatcher.reset();

        let Session {
            station,
            link_events,
            address_events,
            ..
        } = session;

        let mut first_error = None;
        let driver_ready = station.is_some();

        if let Some(mut station) = station {
            keep_first(&mut first_error, "stop", station.stop());
            keep_first(&mut first_error, "deinit", station.deinit());
        }
        if let Some(subscription) = address_events {
            let result = self.platform.unsubscribe(subscription);
            keep_first(&mut first_error, "unregister IP handler", result);
        }
        if let Some(subscription) = link_events {
            let result = self.platform.unsubscribe(subscription);
            keep_first(&mut first_error, "unregister WiFi handler", result);
        }

        if !driver_ready {
            error!("📶 WiFi driver was never initialized, released partial init");
            return Err(NetworkError::NotInitialized);
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => {
                info!("📶 Network stack released");
                Ok(())
            }
        }
    }

    fn ready_session(&mut self) -> Result<&mut Session<P>, NetworkError> {
        match self.session.as_mut() {
            Some(session) if session.station.is_some() => Ok(session),
            _ => Err(NetworkError::NotInitialized),
        }
    }
}

fn request_link<S: Station>(
    station: &mut S,
    config: &StationConfig,
    power_save: PowerSave,
    link_started: bool,
) -> Result<(), DriverError> {
    station.configure(config)?;
    station.set_power_save(power_save)?;
    if link_started {
        // No fresh start event will come, ask for the connection directly.
        station.connect()
    } else {
        station.start()
    }
}

fn init_failure(stage: InitStage) -> impl FnOnce(DriverError) -> NetworkError {
    move |source| {
        error!("📶 Failed to initialize {}: {}", stage, source);
        NetworkError::init(stage, source)
    }
}

fn keep_first(slot: &mut Option<DriverError>, step: &str, result: Result<(), DriverError>) {
    if let Err(e) = result {
        warn!("📶 WiFi {} failed: {}", step, e);
        slot.get_or_insert(e);
    }
}

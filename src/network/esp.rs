//! ESP-IDF implementation of the network platform seams.

use super::error::DriverError;
use super::event::{EventSink, EventSource, NetworkEvent};
use super::platform::{LinkControl, PowerSave, Station, StationConfig, WifiPlatform};
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::{
    esp, esp_netif_init, esp_wifi_connect, esp_wifi_set_ps, esp_wifi_set_storage,
    wifi_ps_type_t, wifi_ps_type_t_WIFI_PS_MAX_MODEM, wifi_ps_type_t_WIFI_PS_MIN_MODEM,
    wifi_ps_type_t_WIFI_PS_NONE, wifi_storage_t_WIFI_STORAGE_RAM,
};
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};

pub struct EspPlatform {
    modem: Modem,
    nvs: Option<EspDefaultNvsPartition>,
    sys_loop: Option<EspSystemEventLoop>,
}

impl EspPlatform {
    pub fn new(modem: Modem, nvs: Option<EspDefaultNvsPartition>) -> Self {
        Self {
            modem,
            nvs,
            sys_loop: None,
        }
    }

    fn sys_loop(&self) -> Result<&EspSystemEventLoop, DriverError> {
        self.sys_loop.as_ref().ok_or(DriverError::INVALID_STATE)
    }
}

/// `esp_wifi_connect` needs no handle, so the event loop can call it directly.
pub struct EspLink;

impl LinkControl for EspLink {
    fn reconnect(&self) -> Result<(), DriverError> {
        esp!(unsafe { esp_wifi_connect() })?;
        Ok(())
    }
}

impl WifiPlatform for EspPlatform {
    type Station = EspStation;
    type Subscription = EspSubscription<'static, System>;
    type Link = EspLink;

    fn link_control(&self) -> EspLink {
        EspLink
    }

    fn init_netif_stack(&mut self) -> Result<(), DriverError> {
        esp!(unsafe { esp_netif_init() })?;
        Ok(())
    }

    fn create_event_loop(&mut self) -> Result<(), DriverError> {
        if self.sys_loop.is_none() {
            self.sys_loop = Some(EspSystemEventLoop::take()?);
        }
        Ok(())
    }

    fn subscribe(
        &mut self,
        source: EventSource,
        mut sink: EventSink,
    ) -> Result<Self::Subscription, DriverError> {
        let sys_loop = self.sys_loop()?;
        let subscription = match source {
            EventSource::Link => {
                sys_loop.subscribe::<WifiEvent, _>(move |event| sink(link_event(&event)))?
            }
            EventSource::Address => {
                sys_loop.subscribe::<IpEvent, _>(move |event| sink(address_event(&event)))?
            }
        };
        Ok(subscription)
    }

    fn unsubscribe(&mut self, subscription: Self::Subscription) -> Result<(), DriverError> {
        drop(subscription);
        Ok(())
    }

    fn create_station(&mut self) -> Result<EspStation, DriverError> {
        let sys_loop = self.sys_loop()?.clone();
        // SAFETY: the previous `EspWifi`, if any, was dropped by `EspStation::deinit`
        // before a new init cycle can reach this point.
        let modem = unsafe { self.modem.clone_unchecked() };
        let wifi = EspWifi::new(modem, sys_loop, self.nvs.clone())?;
        Ok(EspStation { wifi })
    }
}

pub struct EspStation {
    wifi: EspWifi<'static>,
}

impl Station for EspStation {
    fn configure(&mut self, config: &StationConfig) -> Result<(), DriverError> {
        esp!(unsafe { esp_wifi_set_storage(wifi_storage_t_WIFI_STORAGE_RAM) })?;

        let client = ClientConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| DriverError::FAIL)?,
            password: config
                .password
                .as_str()
                .try_into()
                .map_err(|_| DriverError::FAIL)?,
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        };
        self.wifi.set_configuration(&Configuration::Client(client))?;
        Ok(())
    }

    fn set_power_save(&mut self, mode: PowerSave) -> Result<(), DriverError> {
        esp!(unsafe { esp_wifi_set_ps(power_save_mode(mode)) })?;
        Ok(())
    }

    fn start(&mut self) -> Result<(), DriverError> {
        self.wifi.start()?;
        Ok(())
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        self.wifi.connect()?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.wifi.disconnect()?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.wifi.stop()?;
        Ok(())
    }

    fn deinit(self) -> Result<(), DriverError> {
        // Dropping `EspWifi` deinitializes the driver, clears the default
        // handlers and destroys both netifs.
        drop(self.wifi);
        Ok(())
    }
}

fn power_save_mode(mode: PowerSave) -> wifi_ps_type_t {
    match mode {
        PowerSave::None => wifi_ps_type_t_WIFI_PS_NONE,
        PowerSave::MinModem => wifi_ps_type_t_WIFI_PS_MIN_MODEM,
        PowerSave::MaxModem => wifi_ps_type_t_WIFI_PS_MAX_MODEM,
    }
}

fn link_event(event: &WifiEvent<'_>) -> NetworkEvent {
    match event {
        WifiEvent::Ready => NetworkEvent::WifiReady,
        WifiEvent::ScanDone(_) => NetworkEvent::ScanDone,
        WifiEvent::StaStarted => NetworkEvent::StaStarted,
        WifiEvent::StaStopped => NetworkEvent::StaStopped,
        WifiEvent::StaConnected(_) => NetworkEvent::StaConnected,
        WifiEvent::StaDisconnected(_) => NetworkEvent::StaDisconnected,
        WifiEvent::StaAuthmodeChanged(_) => NetworkEvent::StaAuthmodeChanged,
        _ => NetworkEvent::Unhandled,
    }
}

fn address_event(event: &IpEvent<'_>) -> NetworkEvent {
    match event {
        IpEvent::DhcpIpAssigned(assignment) => NetworkEvent::GotIp(assignment.ip()),
        IpEvent::DhcpIp6Assigned(assignment) => NetworkEvent::GotIp6(assignment.ip()),
        IpEvent::DhcpIpDeassigned(_) => NetworkEvent::LostIp,
        _ => NetworkEvent::Unhandled,
    }
}

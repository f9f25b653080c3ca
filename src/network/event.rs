use core::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Which platform observer an event arrives through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSource {
    /// Radio-level station events.
    Link,
    /// DHCP / SLAAC address events.
    Address,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => f.write_str("WiFi"),
            Self::Address => f.write_str("IP"),
        }
    }
}

/// Connectivity notification delivered by the platform event loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    WifiReady,
    ScanDone,
    StaStarted,
    StaStopped,
    StaConnected,
    StaDisconnected,
    StaAuthmodeChanged,
    GotIp(Ipv4Addr),
    GotIp6(Ipv6Addr),
    LostIp,
    Unhandled,
}

impl NetworkEvent {
    pub const fn source(&self) -> EventSource {
        match self {
            Self::GotIp(_) | Self::GotIp6(_) | Self::LostIp => EventSource::Address,
            _ => EventSource::Link,
        }
    }

    /// Address carried by an assignment event.
    pub fn assigned_address(&self) -> Option<IpAddr> {
        match *self {
            Self::GotIp(ip) => Some(IpAddr::V4(ip)),
            Self::GotIp6(ip) => Some(IpAddr::V6(ip)),
            _ => None,
        }
    }
}

/// Callback handed to the platform for one [`EventSource`]. Runs on the
/// platform's event-dispatch task.
pub type EventSink = Box<dyn FnMut(NetworkEvent) + Send + 'static>;

//! Connection lifecycle state machine.
//!
//! [`LinkMachine`] is pure: it consumes [`NetworkEvent`]s and tells the caller
//! what to do next through a [`LinkAction`]. It never touches the driver.

use super::event::NetworkEvent;
use crate::config::WIFI_MAX_RETRIES;
use std::net::IpAddr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Uninitialized,
    Idle,
    Connecting,
    Connected,
    Retrying,
    Failed,
}

impl LinkState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Retrying => "Retrying",
            Self::Failed => "Failed",
        }
    }

    /// States in which a link drop is answered with a reconnect.
    const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Retrying)
    }
}

/// How a connect attempt concluded. Exactly one is delivered per attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(IpAddr),
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkAction {
    Ignore,
    Reconnect,
    Raise(ConnectOutcome),
}

/// Retry budget for disconnect-triggered reconnects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u8,
}

impl RetryPolicy {
    pub const fn new(max_retries: u8) -> Self {
        Self { max_retries }
    }

    pub const fn allows(&self, retries_so_far: u8) -> bool {
        retries_so_far < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(WIFI_MAX_RETRIES)
    }
}

#[derive(Debug)]
pub struct LinkMachine {
    state: LinkState,
    retry_count: u8,
    policy: RetryPolicy,
    link_started: bool,
    address: Option<IpAddr>,
}

impl LinkMachine {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            state: LinkState::Uninitialized,
            retry_count: 0,
            policy,
            link_started: false,
            address: None,
        }
    }

    pub const fn state(&self) -> LinkState {
        self.state
    }

    pub const fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub const fn link_started(&self) -> bool {
        self.link_started
    }

    /// Address of an established connection, if any.
    pub const fn connected_address(&self) -> Option<IpAddr> {
        match self.state {
            LinkState::Connected => self.address,
            _ => None,
        }
    }

    pub fn mark_initialized(&mut self) {
        self.state = LinkState::Idle;
    }

    pub fn begin_attempt(&mut self) {
        self.state = LinkState::Connecting;
        self.retry_count = 0;
    }

    /// Gives up on the running attempt without raising anything; late
    /// disconnects are then ignored.
    pub fn abandon_attempt(&mut self) {
        self.state = LinkState::Failed;
    }

    /// Explicit disconnect: stop reacting to link drops.
    pub fn halt(&mut self) {
        if self.state != LinkState::Uninitialized {
            self.state = LinkState::Idle;
        }
        self.address = None;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }

    pub fn on_event(&mut self, event: &NetworkEvent) -> LinkAction {
        match *event {
            NetworkEvent::StaStarted => {
                self.link_started = true;
                if self.state == LinkState::Connecting {
                    LinkAction::Reconnect
                } else {
                    LinkAction::Ignore
                }
            }
            NetworkEvent::StaStopped => {
                self.link_started = false;
                self.address = None;
                LinkAction::Ignore
            }
            NetworkEvent::StaDisconnected => self.on_link_lost(),
            NetworkEvent::GotIp(_) | NetworkEvent::GotIp6(_) => match event.assigned_address() {
                Some(address) if self.state.is_active() => {
                    self.retry_count = 0;
                    self.state = LinkState::Connected;
                    self.address = Some(address);
                    LinkAction::Raise(ConnectOutcome::Connected(address))
                }
                _ => LinkAction::Ignore,
            },
            NetworkEvent::LostIp => {
                self.address = None;
                LinkAction::Ignore
            }
            NetworkEvent::WifiReady
            | NetworkEvent::ScanDone
            | NetworkEvent::StaConnected
            | NetworkEvent::StaAuthmodeChanged
            | NetworkEvent::Unhandled => LinkAction::Ignore,
        }
    }

    /// The driver refused a connect request, so no disconnect event will
    /// follow. Charged against the retry budget like a dropped link.
    pub fn on_request_rejected(&mut self) -> LinkAction {
        self.on_link_lost()
    }

    fn on_link_lost(&mut self) -> LinkAction {
        self.address = None;
        if !self.state.is_active() {
            return LinkAction::Ignore;
        }

        if self.policy.allows(self.retry_count) {
            self.retry_count += 1;
            if self.state != LinkState::Connecting {
                self.state = LinkState::Retrying;
            }
            LinkAction::Reconnect
        } else {
            self.state = LinkState::Failed;
            LinkAction::Raise(ConnectOutcome::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 42);

    fn connecting() -> LinkMachine {
        let mut machine = LinkMachine::new(RetryPolicy::default());
        machine.mark_initialized();
        machine.begin_attempt();
        machine
    }

    #[test]
    fn link_start_while_connecting_requests_connect() {
        let mut machine = connecting();
        assert_eq!(
            machine.on_event(&NetworkEvent::StaStarted),
            LinkAction::Reconnect
        );
        assert!(machine.link_started());
    }

    #[test]
    fn link_start_while_idle_is_ignored() {
        let mut machine = LinkMachine::new(RetryPolicy::default());
        machine.mark_initialized();
        assert_eq!(
            machine.on_event(&NetworkEvent::StaStarted),
            LinkAction::Ignore
        );
    }

    #[test]
    fn each_disconnect_within_budget_reconnects_once_without_raising() {
        let mut machine = connecting();
        for expected in 1..=WIFI_MAX_RETRIES {
            assert_eq!(
                machine.on_event(&NetworkEvent::StaDisconnected),
                LinkAction::Reconnect
            );
            assert_eq!(machine.retry_count(), expected);
            assert_eq!(machine.state(), LinkState::Connecting);
        }
    }

    #[test]
    fn exhausted_budget_raises_failed_exactly_once() {
        let mut machine = connecting();
        for _ in 0..WIFI_MAX_RETRIES {
            machine.on_event(&NetworkEvent::StaDisconnected);
        }

        assert_eq!(
            machine.on_event(&NetworkEvent::StaDisconnected),
            LinkAction::Raise(ConnectOutcome::Failed)
        );
        assert_eq!(machine.state(), LinkState::Failed);
        assert_eq!(machine.retry_count(), WIFI_MAX_RETRIES);

        assert_eq!(
            machine.on_event(&NetworkEvent::StaDisconnected),
            LinkAction::Ignore
        );
        assert_eq!(machine.retry_count(), WIFI_MAX_RETRIES);
    }

    #[test]
    fn address_assignment_resets_retries_and_raises_connected() {
        let mut machine = connecting();
        machine.on_event(&NetworkEvent::StaDisconnected);
        machine.on_event(&NetworkEvent::StaDisconnected);

        let action = machine.on_event(&NetworkEvent::GotIp(ADDRESS));
        assert_eq!(
            action,
            LinkAction::Raise(ConnectOutcome::Connected(IpAddr::V4(ADDRESS)))
        );
        assert_eq!(machine.retry_count(), 0);
        assert_eq!(machine.connected_address(), Some(IpAddr::V4(ADDRESS)));
    }

    #[test]
    fn ipv6_assignment_also_connects() {
        let mut machine = connecting();
        let address = "fe80::1".parse().unwrap();
        assert_eq!(
            machine.on_event(&NetworkEvent::GotIp6(address)),
            LinkAction::Raise(ConnectOutcome::Connected(IpAddr::V6(address)))
        );
        assert_eq!(machine.state(), LinkState::Connected);
    }

    #[test]
    fn drop_after_connect_enters_retrying() {
        let mut machine = connecting();
        machine.on_event(&NetworkEvent::GotIp(ADDRESS));

        assert_eq!(
            machine.on_event(&NetworkEvent::StaDisconnected),
            LinkAction::Reconnect
        );
        assert_eq!(machine.state(), LinkState::Retrying);
        assert_eq!(machine.connected_address(), None);

        machine.on_event(&NetworkEvent::GotIp(ADDRESS));
        assert_eq!(machine.state(), LinkState::Connected);
        assert_eq!(machine.retry_count(), 0);
    }

    #[test]
    fn halted_machine_ignores_disconnects_and_addresses() {
        let mut machine = connecting();
        machine.halt();
        assert_eq!(machine.state(), LinkState::Idle);
        assert_eq!(
            machine.on_event(&NetworkEvent::StaDisconnected),
            LinkAction::Ignore
        );
        assert_eq!(
            machine.on_event(&NetworkEvent::GotIp(ADDRESS)),
            LinkAction::Ignore
        );
    }

    #[test]
    fn link_stop_forgets_started_link() {
        let mut machine = connecting();
        machine.on_event(&NetworkEvent::StaStarted);
        machine.on_event(&NetworkEvent::StaStopped);
        assert!(!machine.link_started());
    }

    #[test]
    fn rejected_requests_spend_the_budget() {
        let mut machine = connecting();
        machine.on_event(&NetworkEvent::StaStarted);
        for expected in 1..=WIFI_MAX_RETRIES {
            assert_eq!(machine.on_request_rejected(), LinkAction::Reconnect);
            assert_eq!(machine.retry_count(), expected);
        }
        assert_eq!(
            machine.on_request_rejected(),
            LinkAction::Raise(ConnectOutcome::Failed)
        );
        assert_eq!(machine.state(), LinkState::Failed);
    }

    #[test]
    fn zero_budget_fails_on_first_disconnect() {
        let mut machine = LinkMachine::new(RetryPolicy::new(0));
        machine.mark_initialized();
        machine.begin_attempt();
        assert_eq!(
            machine.on_event(&NetworkEvent::StaDisconnected),
            LinkAction::Raise(ConnectOutcome::Failed)
        );
    }
}

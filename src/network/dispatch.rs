//! Routes platform events into the [`LinkMachine`] and acts on its answer.

use super::event::{EventSink, EventSource, NetworkEvent};
use super::platform::LinkControl;
use super::state::{ConnectOutcome, LinkAction, LinkMachine, LinkState, RetryPolicy};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{info, warn};
use std::cell::RefCell;
use std::net::IpAddr;
use std::sync::Arc;

/// One-shot outcome of a single connect attempt.
pub type ConnectSignal = Signal<CriticalSectionRawMutex, ConnectOutcome>;

pub(crate) enum AttemptStart {
    AlreadyConnected(IpAddr),
    Started {
        signal: Arc<ConnectSignal>,
        link_started: bool,
    },
}

struct Step {
    action: LinkAction,
    pending: Option<Arc<ConnectSignal>>,
    retries: u8,
    state: LinkState,
}

struct Shared {
    machine: LinkMachine,
    pending: Option<Arc<ConnectSignal>>,
}

/// Owns the state touched by both the event loop and the caller. Driver
/// calls and signal raising happen outside the critical section.
pub(crate) struct Dispatcher<L> {
    shared: Mutex<CriticalSectionRawMutex, RefCell<Shared>>,
    link: L,
}

impl<L: LinkControl> Dispatcher<L> {
    pub(crate) fn new(link: L, policy: RetryPolicy) -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                machine: LinkMachine::new(policy),
                pending: None,
            })),
            link,
        }
    }

    pub(crate) fn sink(self: &Arc<Self>) -> EventSink {
        let dispatcher = Arc::clone(self);
        Box::new(move |event| dispatcher.dispatch(event))
    }

    pub(crate) fn dispatch(&self, event: NetworkEvent) {
        let source = event.source();
        info!("📶 Handling {} event: {:?}", source, event);

        let mut step = self.advance(|machine| machine.on_event(&event));
        loop {
            match step.action {
                LinkAction::Ignore => {
                    log_ignored(source, &event, step.state);
                    return;
                }
                LinkAction::Reconnect => {
                    if step.retries > 0 {
                        info!(
                            "📶 Retrying to connect to WiFi network (retry {})...",
                            step.retries
                        );
                    } else {
                        info!("📶 WiFi started, connecting to AP...");
                    }
                    match self.link.reconnect() {
                        Ok(()) => return,
                        // A rejected request counts as a lost link.
                        Err(e) => {
                            warn!("📶 Connect request failed: {}", e);
                            step = self.advance(LinkMachine::on_request_rejected);
                        }
                    }
                }
                LinkAction::Raise(outcome) => {
                    match outcome {
                        ConnectOutcome::Connected(address) => info!("📶 Got IP: {}", address),
                        ConnectOutcome::Failed => warn!("📶 Failed to connect to WiFi network"),
                    }
                    match step.pending {
                        Some(signal) => signal.signal(outcome),
                        None => info!("📶 No connect attempt waiting for {:?}", outcome),
                    }
                    return;
                }
            }
        }
    }

    /// Runs one machine transition under the lock, taking the pending signal
    /// when the transition concludes the attempt.
    fn advance(&self, transition: impl FnOnce(&mut LinkMachine) -> LinkAction) -> Step {
        self.with(|shared| {
            let action = transition(&mut shared.machine);
            let pending = match action {
                LinkAction::Raise(_) => shared.pending.take(),
                _ => None,
            };
            Step {
                action,
                pending,
                retries: shared.machine.retry_count(),
                state: shared.machine.state(),
            }
        })
    }

    pub(crate) fn begin_attempt(&self) -> AttemptStart {
        self.with(|shared| {
            if let Some(address) = shared.machine.connected_address() {
                return AttemptStart::AlreadyConnected(address);
            }

            shared.machine.begin_attempt();
            let signal = Arc::new(ConnectSignal::new());
            shared.pending = Some(Arc::clone(&signal));
            AttemptStart::Started {
                signal,
                link_started: shared.machine.link_started(),
            }
        })
    }

    /// Drops the pending signal and marks the attempt failed.
    pub(crate) fn abandon_attempt(&self) {
        self.with(|shared| {
            shared.pending = None;
            shared.machine.abandon_attempt();
        });
    }

    /// Drops the pending signal (absent is fine) and stops reacting to link drops.
    pub(crate) fn halt(&self) {
        self.with(|shared| {
            shared.pending = None;
            shared.machine.halt();
        });
    }

    pub(crate) fn mark_initialized(&self) {
        self.with(|shared| shared.machine.mark_initialized());
    }

    pub(crate) fn reset(&self) {
        self.with(|shared| {
            shared.pending = None;
            shared.machine.reset();
        });
    }

    pub(crate) fn state(&self) -> LinkState {
        self.with(|shared| shared.machine.state())
    }

    pub(crate) fn retry_count(&self) -> u8 {
        self.with(|shared| shared.machine.retry_count())
    }

    pub(crate) fn address(&self) -> Option<IpAddr> {
        self.with(|shared| shared.machine.connected_address())
    }

    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> bool {
        self.with(|shared| shared.pending.is_some())
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        self.shared.lock(|cell| f(&mut *cell.borrow_mut()))
    }
}

fn log_ignored(source: EventSource, event: &NetworkEvent, state: LinkState) {
    match event {
        NetworkEvent::WifiReady => info!("📶 WiFi ready"),
        NetworkEvent::ScanDone => info!("📶 WiFi scan done"),
        NetworkEvent::StaStopped => info!("📶 WiFi stopped"),
        NetworkEvent::StaConnected => info!("📶 WiFi connected, waiting for address"),
        NetworkEvent::StaAuthmodeChanged => info!("📶 WiFi authmode changed"),
        NetworkEvent::LostIp => warn!("📶 Lost IP"),
        NetworkEvent::Unhandled => info!("📶 {} event not handled", source),
        _ => info!("📶 {:?} ignored in state {}", event, state.as_str()),
    }
}

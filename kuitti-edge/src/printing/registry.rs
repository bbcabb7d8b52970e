//! Printer registry
//!
//! Sole owner of every device's `connection_state`. Each device sits behind
//! its own lock, so updating one printer never blocks another. Removal
//! deactivates the record; nothing is ever deleted.

use std::sync::Arc;

use dashmap::DashMap;
use kuitti_printer::{PrintError, PrintResult};
use parking_lot::RwLock;
use shared::{ConnectionState, PrinterDevice};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the event channel; slow subscribers miss old events
const EVENT_CAPACITY: usize = 64;

/// Registry changes, for operator UIs
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Registered {
        device_id: String,
    },
    StateChanged {
        device_id: String,
        from: ConnectionState,
        to: ConnectionState,
    },
    /// Reconnect attempt `attempt` of `max`
    ConnectAttempt {
        device_id: String,
        attempt: u32,
        max: u32,
    },
    Deactivated {
        device_id: String,
    },
}

pub struct PrinterRegistry {
    devices: DashMap<String, Arc<RwLock<PrinterDevice>>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl PrinterRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            devices: DashMap::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn entry(&self, id: &str) -> PrintResult<Arc<RwLock<PrinterDevice>>> {
        self.devices
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| PrintError::InvalidState(format!("Unknown printer {}", id)))
    }

    /// Add or update a device
    ///
    /// Known devices keep their connection state; every other field is
    /// replaced. Discovery does not call this for removed devices.
    pub fn register(&self, device: PrinterDevice) -> PrinterDevice {
        let id = device.id.clone();
        let slot = self
            .devices
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(RwLock::new(PrinterDevice {
                    connection_state: ConnectionState::Disconnected,
                    ..device.clone()
                }))
            })
            .value()
            .clone();

        let snapshot = {
            let mut current = slot.write();
            let state = current.connection_state;
            *current = PrinterDevice {
                connection_state: state,
                ..device
            };
            current.clone()
        };
        info!(device_id = %id, transport = %snapshot.transport_kind, "Printer registered");
        self.emit(RegistryEvent::Registered { device_id: id });
        snapshot
    }

    pub fn get(&self, id: &str) -> Option<PrinterDevice> {
        self.devices.get(id).map(|e| e.value().read().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Active devices, sorted by name
    pub fn list(&self) -> Vec<PrinterDevice> {
        let mut devices: Vec<PrinterDevice> = self
            .devices
            .iter()
            .map(|e| e.value().read().clone())
            .filter(|d| d.is_active)
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        devices
    }

    /// Every record, deactivated ones included
    pub fn list_all(&self) -> Vec<PrinterDevice> {
        let mut devices: Vec<PrinterDevice> =
            self.devices.iter().map(|e| e.value().read().clone()).collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    pub fn state(&self, id: &str) -> Option<ConnectionState> {
        self.devices.get(id).map(|e| e.value().read().connection_state)
    }

    /// Move a device along the state machine, returning the previous state
    ///
    /// The check and the write happen under the device's write lock.
    pub fn transition(&self, id: &str, next: ConnectionState) -> PrintResult<ConnectionState> {
        let entry = self.entry(id)?;
        let previous = {
            let mut device = entry.write();
            let previous = device.connection_state;
            if !previous.can_transition_to(next) {
                return Err(PrintError::InvalidState(format!(
                    "{}: cannot go from {} to {}",
                    id, previous, next
                )));
            }
            device.connection_state = next;
            previous
        };
        debug!(device_id = %id, from = %previous, to = %next, "State changed");
        self.emit(RegistryEvent::StateChanged {
            device_id: id.to_string(),
            from: previous,
            to: next,
        });
        Ok(previous)
    }

    /// Drop back to `Disconnected` from any state
    ///
    /// For session loss outside the normal flow (cancelled send, abandoned
    /// connect, deactivation).
    pub fn reset(&self, id: &str) {
        let Ok(entry) = self.entry(id) else {
            return;
        };
        let previous = {
            let mut device = entry.write();
            std::mem::replace(&mut device.connection_state, ConnectionState::Disconnected)
        };
        if previous != ConnectionState::Disconnected {
            debug!(device_id = %id, from = %previous, "State reset");
            self.emit(RegistryEvent::StateChanged {
                device_id: id.to_string(),
                from: previous,
                to: ConnectionState::Disconnected,
            });
        }
    }

    pub fn connect_attempt(&self, id: &str, attempt: u32, max: u32) {
        self.emit(RegistryEvent::ConnectAttempt {
            device_id: id.to_string(),
            attempt,
            max,
        });
    }

    /// Logical removal
    pub fn deactivate(&self, id: &str) -> PrintResult<()> {
        let entry = self.entry(id)?;
        entry.write().is_active = false;
        self.reset(id);
        info!(device_id = %id, "Printer deactivated");
        self.emit(RegistryEvent::Deactivated {
            device_id: id.to_string(),
        });
        Ok(())
    }
}

impl Default for PrinterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::TransportKind;

    fn device(id: &str) -> PrinterDevice {
        PrinterDevice::with_address(format!("Printer {}", id), TransportKind::Direct, id)
    }

    #[test]
    fn test_transitions_follow_state_machine() {
        let registry = PrinterRegistry::new();
        registry.register(device("a"));

        use ConnectionState::*;
        assert_eq!(registry.transition("a", Connecting).unwrap(), Disconnected);
        assert_eq!(registry.transition("a", Connected).unwrap(), Connecting);
        let err = registry.transition("a", Connecting).unwrap_err();
        assert!(matches!(err, PrintError::InvalidState(_)));
        assert_eq!(registry.state("a"), Some(Connected));

        assert!(registry.transition("missing", Connecting).is_err());
    }

    #[test]
    fn test_reregister_keeps_state() {
        let registry = PrinterRegistry::new();
        registry.register(device("a"));
        registry.transition("a", ConnectionState::Connecting).unwrap();

        let mut renamed = device("a");
        renamed.name = "Keittiö".into();
        renamed.connection_state = ConnectionState::Connected;
        let stored = registry.register(renamed);

        assert_eq!(stored.name, "Keittiö");
        assert_eq!(stored.connection_state, ConnectionState::Connecting);
    }

    #[test]
    fn test_deactivate_keeps_record() {
        let registry = PrinterRegistry::new();
        registry.register(device("b"));
        registry.register(device("a"));
        registry.deactivate("a").unwrap();

        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.list_all().len(), 2);
        let a = registry.get("a").unwrap();
        assert!(!a.is_active);
        assert_eq!(a.connection_state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let registry = PrinterRegistry::new();
        let mut rx = registry.subscribe();
        registry.register(device("a"));
        registry.transition("a", ConnectionState::Connecting).unwrap();
        registry.connect_attempt("a", 1, 3);

        assert_eq!(
            rx.recv().await.unwrap(),
            RegistryEvent::Registered { device_id: "a".into() }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            RegistryEvent::StateChanged {
                device_id: "a".into(),
                from: ConnectionState::Disconnected,
                to: ConnectionState::Connecting,
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            RegistryEvent::ConnectAttempt {
                device_id: "a".into(),
                attempt: 1,
                max: 3,
            }
        );
    }
}

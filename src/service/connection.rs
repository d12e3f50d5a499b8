//! Device connection lifecycle
//!
//! Admission control, connect/disconnect requests, the connect watchdog,
//! native connection events, and bond revocation. Descriptors are created
//! only by a local `connect` or a native `Connecting`/`Connected` event and
//! removed only once the device is both unbonded and `Disconnected`.

use super::{DeviceDescriptor, LeAudioService};
use crate::hooks::{BondState, ConnectionPolicy, SystemHooks};
use crate::stack::PeerCommand;
use crate::{ConnectionState, DeviceAddress, GroupId, Notification};

impl<H: SystemHooks> LeAudioService<H> {
    /// Request a connection to `device`.
    ///
    /// Returns `false` when the native stack is not initialized, admission
    /// fails (bond, policy, or missing LE Audio service), or the device is
    /// already past `Disconnected`.
    pub fn connect(&mut self, device: DeviceAddress) -> bool {
        if !self.native_initialized {
            defmt::warn!("[SERVICE] connect {} before native init", device);
            return false;
        }
        if !self.ok_to_connect(device) {
            return false;
        }
        if let Some(desc) = self.devices.get(&device) {
            if desc.state != ConnectionState::Disconnected {
                return false;
            }
        } else if self.devices.insert(device, DeviceDescriptor::new()).is_err() {
            defmt::error!("[SERVICE] device table full, refusing {}", device);
            return false;
        }
        self.transition(device, ConnectionState::Connecting);
        self.effects
            .peer
            .push(PeerCommand::ConnectDevice(device))
            .ok();
        true
    }

    /// Request disconnection of `device`.
    ///
    /// Valid from `Connecting` and `Connected`; anything else returns `false`.
    pub fn disconnect(&mut self, device: DeviceAddress) -> bool {
        let Some(desc) = self.devices.get(&device) else {
            return false;
        };
        match desc.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.transition(device, ConnectionState::Disconnecting);
                self.effects
                    .peer
                    .push(PeerCommand::DisconnectDevice(device))
                    .ok();
                true
            }
            _ => false,
        }
    }

    /// The connect watchdog fired for `device`.
    ///
    /// Stale deadlines (the device left `Connecting` meanwhile) are ignored.
    pub fn on_connect_timeout(&mut self, device: DeviceAddress) {
        if self
            .devices
            .get(&device)
            .is_some_and(|desc| desc.state == ConnectionState::Connecting)
        {
            defmt::warn!("[SERVICE] connect timeout for {}", device);
            self.transition(device, ConnectionState::Disconnected);
        }
    }

    /// Record a connection policy change and act on it.
    pub fn set_connection_policy(&mut self, device: DeviceAddress, policy: ConnectionPolicy) -> bool {
        match policy {
            ConnectionPolicy::Allowed => {
                self.connect(device);
                let grouped = self.device_group(device).is_some();
                self.authorization
                    .maybe_authorize(device, grouped, &mut self.effects.intents);
            }
            ConnectionPolicy::Forbidden => {
                self.disconnect(device);
                self.authorization
                    .deauthorize(device, &mut self.effects.intents);
            }
            ConnectionPolicy::Unknown => {}
        }
        true
    }

    /// The platform reported a bond state change for `device`.
    pub fn bond_state_changed(&mut self, device: DeviceAddress, state: BondState) {
        if state != BondState::None {
            return;
        }
        let Some(desc) = self.devices.get(&device) else {
            // No session state, but companion records may exist
            self.authorization.forget(device, &mut self.effects.intents);
            return;
        };
        match desc.state {
            ConnectionState::Disconnected => self.remove_descriptor(device),
            ConnectionState::Connecting => {
                // The connect attempt is dropped; the descriptor stays until
                // the stack confirms with a terminal Disconnected
                self.transition(device, ConnectionState::Disconnected);
            }
            ConnectionState::Connected => {
                // Removal waits for the terminal Disconnected event
                self.transition(device, ConnectionState::Disconnecting);
                self.effects
                    .peer
                    .push(PeerCommand::DisconnectDevice(device))
                    .ok();
            }
            ConnectionState::Disconnecting => {}
        }
    }

    pub(crate) fn on_connection_state(&mut self, device: DeviceAddress, state: ConnectionState) {
        if !self.devices.contains_key(&device) {
            match state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    if self.devices.insert(device, DeviceDescriptor::new()).is_err() {
                        defmt::error!("[SERVICE] device table full, dropping {}", device);
                        return;
                    }
                }
                _ => {
                    defmt::debug!(
                        "[SERVICE] {:?} for untracked device {} dropped",
                        defmt::Debug2Format(&state),
                        device
                    );
                    return;
                }
            }
        }
        let Some(desc) = self.devices.get(&device) else {
            return;
        };
        let previous = desc.state;
        let pending = desc.pending_reconnect;
        let group = desc.group;

        // The exposed active device dropping out while another member keeps
        // the group alive is absorbed; the native stack reconnects it.
        if state == ConnectionState::Disconnected
            && previous == ConnectionState::Connected
            && self.is_exposed_active(device)
            && self.hooks.bond_state(device) == BondState::Bonded
            && self.has_other_connected_member(group, device)
        {
            if let Some(desc) = self.devices.get_mut(&device) {
                desc.pending_reconnect = true;
            }
            defmt::debug!("[SERVICE] absorbing disconnect of active {}", device);
            return;
        }
        if state == ConnectionState::Connected && pending {
            if let Some(desc) = self.devices.get_mut(&device) {
                desc.pending_reconnect = false;
            }
            defmt::debug!("[SERVICE] active device {} reconnected", device);
            return;
        }
        if previous == state {
            // A terminal confirmation for a device already forced to
            // Disconnected settles a deferred unbond removal
            if state == ConnectionState::Disconnected {
                self.remove_if_unbonded(device);
            }
            return;
        }
        self.transition(device, state);
        match state {
            ConnectionState::Connected => {
                let grouped = group.is_some();
                self.authorization
                    .maybe_authorize(device, grouped, &mut self.effects.intents);
            }
            ConnectionState::Disconnected => self.finish_disconnect(device),
            _ => {}
        }
    }

    /// Apply a state change and queue the observer notification.
    pub(crate) fn transition(&mut self, device: DeviceAddress, state: ConnectionState) {
        let Some(desc) = self.devices.get_mut(&device) else {
            return;
        };
        let previous = desc.state;
        if previous == state {
            return;
        }
        desc.state = state;
        self.effects
            .notifications
            .push(Notification::ConnectionState {
                device,
                previous,
                state,
            })
            .ok();
    }

    fn finish_disconnect(&mut self, device: DeviceAddress) {
        let group = self.devices.get(&device).and_then(|desc| desc.group);

        if self.is_exposed_active(device)
            && let Some(group) = group
        {
            self.handle_group_deactivated(group, false);
        }

        // An absorbed lead disconnect is finalized once the last member goes
        if let Some(group) = group
            && self.effectively_connected_members(group).is_empty()
        {
            let absorbed = self
                .group_devices(group)
                .iter()
                .copied()
                .find(|m| self.devices.get(m).is_some_and(|d| d.pending_reconnect));
            if let Some(lead) = absorbed {
                if let Some(desc) = self.devices.get_mut(&lead) {
                    desc.pending_reconnect = false;
                }
                self.transition(lead, ConnectionState::Disconnected);
                if self.is_exposed_active(lead) {
                    self.handle_group_deactivated(group, false);
                }
                self.remove_if_unbonded(lead);
            }
        }

        self.remove_if_unbonded(device);
    }

    fn remove_if_unbonded(&mut self, device: DeviceAddress) {
        if self.hooks.bond_state(device) == BondState::None
            && self.devices.contains_key(&device)
        {
            self.remove_descriptor(device);
        }
    }

    fn remove_descriptor(&mut self, device: DeviceAddress) {
        self.devices.remove(&device);
        self.authorization.forget(device, &mut self.effects.intents);
    }

    fn ok_to_connect(&self, device: DeviceAddress) -> bool {
        if self.hooks.bond_state(device) != BondState::Bonded {
            return false;
        }
        match self.hooks.connection_policy(device) {
            ConnectionPolicy::Unknown | ConnectionPolicy::Allowed => {}
            ConnectionPolicy::Forbidden => return false,
        }
        self.hooks.provides_audio_service(device)
    }

    fn has_other_connected_member(&self, group: Option<GroupId>, device: DeviceAddress) -> bool {
        let Some(group) = group else {
            return false;
        };
        self.effectively_connected_members(group)
            .iter()
            .any(|member| *member != device)
    }
}

#[cfg(test)]
mod tests {
    use crate::hooks::{BondState, ConnectionPolicy};
    use crate::service::test_util::{activate_group, connect_device, dev, join_group, set_audio_conf, svc};
    use crate::service::LeAudioService;
    use crate::stack::{PeerCommand, StackEvent};
    use crate::{ConnectionState, GroupId, HostOptions, Notification, ServiceIntent};

    fn connecting_notification(device: crate::DeviceAddress) -> Notification {
        Notification::ConnectionState {
            device,
            previous: ConnectionState::Disconnected,
            state: ConnectionState::Connecting,
        }
    }

    #[test]
    fn test_connect_requires_native_init() {
        let mut service = LeAudioService::new(
            HostOptions::default(),
            crate::hooks::mock::TestHooks::default(),
        );
        assert!(!service.connect(dev(1)));
    }

    #[test]
    fn test_connect_admission_checks() {
        let mut service = svc();

        service.hooks_mut().set_bond(dev(1), BondState::Bonding);
        assert!(!service.connect(dev(1)));

        service.hooks_mut().set_bond(dev(1), BondState::Bonded);
        service
            .hooks_mut()
            .set_policy(dev(1), ConnectionPolicy::Forbidden);
        assert!(!service.connect(dev(1)));

        service
            .hooks_mut()
            .set_policy(dev(1), ConnectionPolicy::Allowed);
        service.hooks_mut().audio_service = false;
        assert!(!service.connect(dev(1)));

        service.hooks_mut().audio_service = true;
        assert!(service.connect(dev(1)));

        let commands = service.take_peer_commands();
        assert_eq!(commands.as_slice(), &[PeerCommand::ConnectDevice(dev(1))]);
        let notifications = service.take_notifications();
        assert_eq!(notifications.as_slice(), &[connecting_notification(dev(1))]);
    }

    #[test]
    fn test_connect_twice_refused() {
        let mut service = svc();
        assert!(service.connect(dev(1)));
        assert!(!service.connect(dev(1)));
    }

    #[test]
    fn test_connect_timeout_forces_disconnected() {
        let mut service = svc();
        assert!(service.connect(dev(1)));
        service.clear_effects();

        service.on_connect_timeout(dev(1));
        let notifications = service.take_notifications();
        assert_eq!(
            notifications.as_slice(),
            &[Notification::ConnectionState {
                device: dev(1),
                previous: ConnectionState::Connecting,
                state: ConnectionState::Disconnected,
            }]
        );
        assert_eq!(service.connection_state(dev(1)), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stale_connect_timeout_ignored() {
        let mut service = svc();
        connect_device(&mut service, dev(1));

        service.on_connect_timeout(dev(1));
        assert!(service.take_notifications().is_empty());
        assert_eq!(service.connection_state(dev(1)), ConnectionState::Connected);
    }

    #[test]
    fn test_untracked_terminal_events_dropped() {
        let mut service = svc();

        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnected,
        });
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnecting,
        });

        assert!(service.take_notifications().is_empty());
        assert!(service.devices().is_empty());
        assert_eq!(service.connection_state(dev(1)), ConnectionState::Disconnected);
    }

    #[test]
    fn test_native_connecting_materializes_descriptor() {
        let mut service = svc();

        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Connecting,
        });
        assert_eq!(service.connection_state(dev(1)), ConnectionState::Connecting);
        assert_eq!(service.take_notifications().len(), 1);
    }

    #[test]
    fn test_duplicate_connection_event_no_notification() {
        let mut service = svc();
        connect_device(&mut service, dev(1));

        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Connected,
        });
        assert!(service.take_notifications().is_empty());
    }

    #[test]
    fn test_disconnect_paths() {
        let mut service = svc();
        assert!(!service.disconnect(dev(1)));

        connect_device(&mut service, dev(1));
        assert!(service.disconnect(dev(1)));
        assert_eq!(
            service.take_peer_commands().as_slice(),
            &[PeerCommand::DisconnectDevice(dev(1))]
        );
        assert_eq!(
            service.connection_state(dev(1)),
            ConnectionState::Disconnecting
        );
        // Already disconnecting
        assert!(!service.disconnect(dev(1)));
    }

    #[test]
    fn test_unbond_while_disconnected_removes_descriptor() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnected,
        });
        service.clear_effects();
        // Still bonded at disconnect time, descriptor retained
        assert_eq!(service.devices().len(), 1);

        service.hooks_mut().set_bond(dev(1), BondState::None);
        service.bond_state_changed(dev(1), BondState::None);
        assert!(service.devices().is_empty());
        assert!(
            service
                .take_intents()
                .contains(&ServiceIntent::Deauthorize(dev(1)))
        );
    }

    #[test]
    fn test_unbond_while_connecting_retains_descriptor() {
        let mut service = svc();
        assert!(service.connect(dev(1)));
        service.clear_effects();

        // The attempt is dropped, the descriptor is not
        service.hooks_mut().set_bond(dev(1), BondState::None);
        service.bond_state_changed(dev(1), BondState::None);
        let notifications = service.take_notifications();
        assert_eq!(
            notifications.as_slice(),
            &[Notification::ConnectionState {
                device: dev(1),
                previous: ConnectionState::Connecting,
                state: ConnectionState::Disconnected,
            }]
        );
        assert_eq!(service.devices().len(), 1);
    }

    #[test]
    fn test_unbond_while_connecting_removes_on_terminal_event() {
        let mut service = svc();
        assert!(service.connect(dev(1)));
        service.clear_effects();

        service.hooks_mut().set_bond(dev(1), BondState::None);
        service.bond_state_changed(dev(1), BondState::None);
        assert_eq!(service.devices().len(), 1);

        // The stack's own terminal confirmation removes it
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnected,
        });
        assert!(service.devices().is_empty());
        assert!(
            service
                .take_intents()
                .contains(&ServiceIntent::Deauthorize(dev(1)))
        );
    }

    #[test]
    fn test_unbond_while_connected_defers_removal() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        service.hooks_mut().set_bond(dev(1), BondState::None);

        service.bond_state_changed(dev(1), BondState::None);
        assert_eq!(
            service.take_peer_commands().as_slice(),
            &[PeerCommand::DisconnectDevice(dev(1))]
        );
        assert_eq!(
            service.connection_state(dev(1)),
            ConnectionState::Disconnecting
        );
        assert!(service.take_intents().is_empty());
        assert_eq!(service.devices().len(), 1);

        // Terminal event lands, now the descriptor and records go
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnected,
        });
        assert!(service.devices().is_empty());
        assert!(
            service
                .take_intents()
                .contains(&ServiceIntent::Deauthorize(dev(1)))
        );
    }

    #[test]
    fn test_policy_forbidden_disconnects_and_deauthorizes() {
        let mut service = svc();
        service.handle_bluetooth_enabled();
        connect_device(&mut service, dev(1));
        join_group(&mut service, dev(1), GroupId(4));
        // join_group authorized the device
        service.clear_effects();

        assert!(service.set_connection_policy(dev(1), ConnectionPolicy::Forbidden));
        assert!(
            service
                .take_intents()
                .contains(&ServiceIntent::Deauthorize(dev(1)))
        );
        assert_eq!(
            service.connection_state(dev(1)),
            ConnectionState::Disconnecting
        );
    }

    #[test]
    fn test_policy_allowed_reconnects_and_reauthorizes() {
        let mut service = svc();
        service.handle_bluetooth_enabled();
        connect_device(&mut service, dev(1));
        join_group(&mut service, dev(1), GroupId(4));
        service.set_connection_policy(dev(1), ConnectionPolicy::Forbidden);
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnected,
        });
        service.clear_effects();

        assert!(service.set_connection_policy(dev(1), ConnectionPolicy::Allowed));
        assert!(
            service
                .take_peer_commands()
                .contains(&PeerCommand::ConnectDevice(dev(1)))
        );
        assert!(
            service
                .take_intents()
                .contains(&ServiceIntent::Authorize(dev(1)))
        );
    }

    #[test]
    fn test_lead_disconnect_absorbed_and_finalized() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        connect_device(&mut service, dev(2));
        join_group(&mut service, dev(1), GroupId(4));
        join_group(&mut service, dev(2), GroupId(4));
        set_audio_conf(&mut service, GroupId(4), 1, 4);
        activate_group(&mut service, dev(1), GroupId(4));
        assert_eq!(service.active_devices()[0], Some(dev(1)));

        // Lead drops out, absorbed silently
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnected,
        });
        assert!(service.take_notifications().is_empty());
        assert_eq!(service.connection_state(dev(1)), ConnectionState::Connected);

        // Last member leaves, the deferred disconnect is finalized
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(2),
            state: ConnectionState::Disconnected,
        });
        let notifications = service.take_notifications();
        assert!(notifications.contains(&Notification::ConnectionState {
            device: dev(2),
            previous: ConnectionState::Connected,
            state: ConnectionState::Disconnected,
        }));
        assert!(notifications.contains(&Notification::ConnectionState {
            device: dev(1),
            previous: ConnectionState::Connected,
            state: ConnectionState::Disconnected,
        }));
        assert!(notifications.contains(&Notification::ActiveDevice { device: None }));

        let updates = service.take_routing_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].new_device, None);
        assert_eq!(updates[0].old_device, Some(dev(1)));
        assert_eq!(service.active_devices(), [None, None]);
    }

    #[test]
    fn test_lead_reconnect_is_silent() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        connect_device(&mut service, dev(2));
        join_group(&mut service, dev(1), GroupId(4));
        join_group(&mut service, dev(2), GroupId(4));
        set_audio_conf(&mut service, GroupId(4), 1, 4);
        activate_group(&mut service, dev(1), GroupId(4));

        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnected,
        });
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Connected,
        });
        assert!(service.take_notifications().is_empty());
        assert_eq!(service.connection_state(dev(1)), ConnectionState::Connected);

        // With the marker cleared, a later disconnect is reported normally
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(2),
            state: ConnectionState::Disconnected,
        });
        service.clear_effects();
        service.message_from_native(StackEvent::ConnectionState {
            device: dev(1),
            state: ConnectionState::Disconnected,
        });
        let notifications = service.take_notifications();
        assert!(notifications.contains(&Notification::ConnectionState {
            device: dev(1),
            previous: ConnectionState::Connected,
            state: ConnectionState::Disconnected,
        }));
        assert_eq!(service.active_devices(), [None, None]);
    }
}

//! LE Audio Service - the single-writer session state machine
//!
//! One [`LeAudioService`] value owns every piece of session state: device
//! descriptors, group descriptors, the active-group selection, the codec
//! cache, the routing bridge, and the broadcast coordinator. All mutation
//! happens through synchronous methods invoked from the processor task, so
//! no locking is needed. Every externally visible consequence is pushed onto
//! an effect queue and drained by the processor after the triggering message.
//!
//! The implementation is split by concern:
//!
//! * `connection` - per-device connect/disconnect lifecycle and bond handling
//! * `groups` - membership, audio configuration, health, stream status
//! * `selector` - active-device selection and group activation flows
//! * `broadcast` - broadcast sessions and unicast fallback
//! * `codecs` - codec change handling on top of the cache

mod broadcast;
mod codecs;
mod connection;
mod groups;
mod selector;

use crate::authorize::AuthorizationTracker;
use crate::codec::{CodecConfigCache, CodecStatus};
use crate::constants::{MAX_BROADCASTS, MAX_DEVICES, MAX_EFFECTS, MAX_GROUPS};
use crate::hooks::SystemHooks;
use crate::routing::{RoutingBridge, RoutingUpdate};
use crate::stack::{AudioContexts, AudioDirections, PeerCommand, StackEvent};
use crate::{
    ConnectionState, DeviceAddress, GroupId, HostOptions, Notification, ServiceIntent,
};
use heapless::{FnvIndexMap, Vec};

/// Per-device session state
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeviceDescriptor {
    pub(crate) state: ConnectionState,
    pub(crate) group: Option<GroupId>,
    pub(crate) sink_location: Option<u32>,
    /// Set when a disconnect of the exposed active device is being absorbed
    /// while the native stack reconnects it
    pub(crate) pending_reconnect: bool,
}

impl DeviceDescriptor {
    pub(crate) fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            group: None,
            sink_location: None,
            pending_reconnect: false,
        }
    }
}

/// Per-group session state
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct GroupDescriptor {
    pub(crate) directions: AudioDirections,
    pub(crate) sink_location: u32,
    pub(crate) source_location: u32,
    pub(crate) available_contexts: AudioContexts,
    pub(crate) active: bool,
    pub(crate) ringtone_registered: bool,
    pub(crate) allowed_mask_set: bool,
}

/// Queued outward effects, drained by the processor after each message
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub(crate) peer: Vec<PeerCommand, MAX_EFFECTS>,
    pub(crate) routing: Vec<RoutingUpdate, MAX_EFFECTS>,
    pub(crate) notifications: Vec<Notification, MAX_EFFECTS>,
    pub(crate) intents: Vec<ServiceIntent, MAX_EFFECTS>,
}

/// Multi-device LE Audio session coordinator
pub struct LeAudioService<H: SystemHooks> {
    pub(crate) hooks: H,
    options: HostOptions,
    pub(crate) devices: FnvIndexMap<DeviceAddress, DeviceDescriptor, MAX_DEVICES>,
    pub(crate) groups: FnvIndexMap<GroupId, GroupDescriptor, MAX_GROUPS>,
    pub(crate) codecs: CodecConfigCache,
    pub(crate) routing: RoutingBridge,
    pub(crate) authorization: AuthorizationTracker,
    /// Group confirmed active by the native stack
    pub(crate) active_group: Option<GroupId>,
    /// Group requested active, awaiting confirmation
    pub(crate) pending_active_group: Option<GroupId>,
    /// Group deactivated for lack of contexts, to reactivate when they return
    pub(crate) reactivate_on_contexts: Option<GroupId>,
    pub(crate) broadcast_sessions: Vec<u32, MAX_BROADCASTS>,
    /// Unicast group to restore after broadcast teardown
    pub(crate) broadcast_fallback: Option<GroupId>,
    pub(crate) hfp_handover_device: Option<DeviceAddress>,
    pub(crate) native_initialized: bool,
    pub(crate) effects: Effects,
}

impl<H: SystemHooks> LeAudioService<H> {
    /// Create a service with the given options and platform hooks
    #[must_use]
    pub fn new(options: HostOptions, hooks: H) -> Self {
        Self {
            hooks,
            options,
            devices: FnvIndexMap::new(),
            groups: FnvIndexMap::new(),
            codecs: CodecConfigCache::new(),
            routing: RoutingBridge::new(),
            authorization: AuthorizationTracker::new(),
            active_group: None,
            pending_active_group: None,
            reactivate_on_contexts: None,
            broadcast_sessions: Vec::new(),
            broadcast_fallback: None,
            hfp_handover_device: None,
            native_initialized: false,
            effects: Effects::default(),
        }
    }

    /// Get a reference to the options
    #[must_use]
    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    /// Get a mutable reference to the platform hooks
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Apply one event reported by the native stack
    pub fn message_from_native(&mut self, event: StackEvent) {
        match event {
            StackEvent::Initialized => {
                defmt::debug!("[SERVICE] native stack initialized");
                self.native_initialized = true;
            }
            StackEvent::ConnectionState { device, state } => {
                self.on_connection_state(device, state);
            }
            StackEvent::GroupNode {
                device,
                group,
                status,
            } => self.on_group_node(device, group, status),
            StackEvent::GroupStatus { group, status } => self.on_group_status(group, status),
            StackEvent::GroupStreamStatus { group, status } => {
                self.on_group_stream_status(group, status);
            }
            StackEvent::AudioConf {
                device: _,
                directions,
                group,
                sink_location,
                source_location,
                available_contexts,
            } => self.on_audio_conf(
                group,
                directions,
                sink_location,
                source_location,
                available_contexts,
            ),
            StackEvent::SinkAudioLocation { device, location } => {
                self.on_sink_audio_location(device, location);
            }
            StackEvent::LocalCodecCapabilities { input, output } => {
                self.codecs.set_capabilities(input, output);
            }
            StackEvent::GroupCodecConfig {
                group,
                input,
                output,
            } => self.on_group_codec_config(group, input, output),
            StackEvent::GroupSelectableCodecConfig {
                group,
                input,
                output,
            } => self.codecs.set_selectable(group, input, output),
            StackEvent::HealthDeviceRecommendation { device, action } => {
                defmt::debug!(
                    "[SERVICE] health recommendation {:?} for {} ignored",
                    defmt::Debug2Format(&action),
                    device
                );
            }
            StackEvent::HealthGroupRecommendation { group, action } => {
                self.on_health_group_recommendation(group, action);
            }
            StackEvent::BroadcastCreated {
                broadcast_id,
                success,
            } => self.on_broadcast_created(broadcast_id, success),
            StackEvent::BroadcastDestroyed { broadcast_id } => {
                self.on_broadcast_destroyed(broadcast_id);
            }
        }
    }

    /// The adapter turned on; authorize already-grouped devices
    pub fn handle_bluetooth_enabled(&mut self) {
        self.authorization.enable();
        let members: Vec<DeviceAddress, MAX_DEVICES> = self
            .devices
            .iter()
            .filter(|(_, desc)| desc.group.is_some())
            .map(|(addr, _)| *addr)
            .collect();
        for device in members {
            self.authorization
                .maybe_authorize(device, true, &mut self.effects.intents);
        }
    }

    /// Take the queued native stack commands
    pub fn take_peer_commands(&mut self) -> Vec<PeerCommand, MAX_EFFECTS> {
        core::mem::take(&mut self.effects.peer)
    }

    /// Take the queued routing updates
    pub fn take_routing_updates(&mut self) -> Vec<RoutingUpdate, MAX_EFFECTS> {
        core::mem::take(&mut self.effects.routing)
    }

    /// Take the queued observer notifications
    pub fn take_notifications(&mut self) -> Vec<Notification, MAX_EFFECTS> {
        core::mem::take(&mut self.effects.notifications)
    }

    /// Take the queued companion service intents
    pub fn take_intents(&mut self) -> Vec<ServiceIntent, MAX_EFFECTS> {
        core::mem::take(&mut self.effects.intents)
    }

    /// Connection state of `device` (`Disconnected` for untracked devices)
    #[must_use]
    pub fn connection_state(&self, device: DeviceAddress) -> ConnectionState {
        self.devices
            .get(&device)
            .map_or(ConnectionState::Disconnected, |desc| desc.state)
    }

    /// All tracked devices
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceAddress, MAX_DEVICES> {
        self.devices.keys().copied().collect()
    }

    /// All connected devices
    #[must_use]
    pub fn connected_devices(&self) -> Vec<DeviceAddress, MAX_DEVICES> {
        self.devices
            .iter()
            .filter(|(_, desc)| desc.state == ConnectionState::Connected)
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// Group `device` belongs to, if any
    #[must_use]
    pub fn device_group(&self, device: DeviceAddress) -> Option<GroupId> {
        self.devices.get(&device).and_then(|desc| desc.group)
    }

    /// All members of `group`
    #[must_use]
    pub fn group_devices(&self, group: GroupId) -> Vec<DeviceAddress, MAX_DEVICES> {
        self.devices
            .iter()
            .filter(|(_, desc)| desc.group == Some(group))
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// First connected member of `group`, the device exposed for routing
    #[must_use]
    pub fn connected_group_lead_device(&self, group: GroupId) -> Option<DeviceAddress> {
        self.devices
            .iter()
            .find(|(_, desc)| desc.group == Some(group) && desc.state == ConnectionState::Connected)
            .map(|(addr, _)| *addr)
    }

    /// Devices exposed to the audio framework, output direction then input
    #[must_use]
    pub fn active_devices(&self) -> [Option<DeviceAddress>; 2] {
        [
            self.routing.exposed_device(true),
            self.routing.exposed_device(false),
        ]
    }

    /// Group confirmed active by the native stack
    #[must_use]
    pub fn active_group(&self) -> Option<GroupId> {
        self.active_group
    }

    /// Sink audio location reported for `device`
    #[must_use]
    pub fn audio_location(&self, device: DeviceAddress) -> Option<u32> {
        self.devices.get(&device).and_then(|desc| desc.sink_location)
    }

    /// Codec snapshot of `group`
    #[must_use]
    pub fn codec_status(&self, group: GroupId) -> CodecStatus {
        self.codecs.status(group)
    }

    /// The audio framework confirmed a routed device appeared.
    ///
    /// Re-announces the active device when the confirmation matches the
    /// exposed output device.
    pub fn audio_device_added(&mut self, device: DeviceAddress, output: bool) {
        if output && self.routing.exposed_device(true) == Some(device) {
            self.effects
                .notifications
                .push(Notification::ActiveDevice {
                    device: Some(device),
                })
                .ok();
        }
    }

    /// The audio framework reported a routed device gone.
    ///
    /// Drops the exposed route and announces that no device is active.
    pub fn audio_device_removed(&mut self, device: DeviceAddress, output: bool) {
        if output && self.routing.exposed_device(true) == Some(device) {
            self.routing.forget(true);
            self.effects
                .notifications
                .push(Notification::ActiveDevice { device: None })
                .ok();
        }
    }

    pub(crate) fn on_sink_audio_location(&mut self, device: DeviceAddress, location: u32) {
        if let Some(desc) = self.devices.get_mut(&device) {
            desc.sink_location = Some(location);
        } else {
            defmt::debug!("[SERVICE] sink location for untracked device {}", device);
        }
    }

    /// Whether `device` is currently exposed to the audio framework
    pub(crate) fn is_exposed_active(&self, device: DeviceAddress) -> bool {
        self.routing.exposed_device(true) == Some(device)
            || self.routing.exposed_device(false) == Some(device)
    }

    /// Connected members of `group`, excluding absorbed disconnects
    pub(crate) fn effectively_connected_members(
        &self,
        group: GroupId,
    ) -> Vec<DeviceAddress, MAX_DEVICES> {
        self.devices
            .iter()
            .filter(|(_, desc)| {
                desc.group == Some(group)
                    && desc.state == ConnectionState::Connected
                    && !desc.pending_reconnect
            })
            .map(|(addr, _)| *addr)
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn clear_effects(&mut self) {
        self.effects = Effects::default();
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::{connect_device, dev, join_group, svc};
    use crate::{ConnectionState, GroupId, Notification};

    #[test]
    fn test_untracked_device_reports_disconnected() {
        let service = svc();
        assert_eq!(
            service.connection_state(dev(1)),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_device_and_group_getters() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        connect_device(&mut service, dev(2));
        join_group(&mut service, dev(1), GroupId(4));
        join_group(&mut service, dev(2), GroupId(4));

        assert_eq!(service.devices().len(), 2);
        assert_eq!(service.connected_devices().len(), 2);
        assert_eq!(service.device_group(dev(1)), Some(GroupId(4)));
        assert_eq!(service.device_group(dev(9)), None);

        let members = service.group_devices(GroupId(4));
        assert!(members.contains(&dev(1)) && members.contains(&dev(2)));
        assert_eq!(service.connected_group_lead_device(GroupId(4)), Some(dev(1)));
        assert_eq!(service.connected_group_lead_device(GroupId(7)), None);
    }

    #[test]
    fn test_audio_location_tracking() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        assert_eq!(service.audio_location(dev(1)), None);

        service.message_from_native(crate::stack::StackEvent::SinkAudioLocation {
            device: dev(1),
            location: 0x0000_0003,
        });
        assert_eq!(service.audio_location(dev(1)), Some(3));

        // Untracked device is dropped
        service.message_from_native(crate::stack::StackEvent::SinkAudioLocation {
            device: dev(9),
            location: 1,
        });
        assert_eq!(service.audio_location(dev(9)), None);
    }

    #[test]
    fn test_enable_sweeps_grouped_devices_once() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        connect_device(&mut service, dev(2));
        join_group(&mut service, dev(1), GroupId(4));

        service.handle_bluetooth_enabled();
        let intents = service.take_intents();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0], crate::ServiceIntent::Authorize(dev(1)));

        // Sweeping again does not re-authorize
        service.handle_bluetooth_enabled();
        assert!(service.take_intents().is_empty());
    }

    #[test]
    fn test_audio_device_added_reannounces_active() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        join_group(&mut service, dev(1), GroupId(4));
        super::test_util::set_audio_conf(&mut service, GroupId(4), 1, 4);
        super::test_util::activate_group(&mut service, dev(1), GroupId(4));

        service.audio_device_added(dev(1), true);
        let notifications = service.take_notifications();
        assert!(notifications.contains(&Notification::ActiveDevice {
            device: Some(dev(1))
        }));

        // Input-side confirmations and foreign devices are ignored
        service.audio_device_added(dev(1), false);
        service.audio_device_added(dev(2), true);
        assert!(service.take_notifications().is_empty());
    }

    #[test]
    fn test_audio_device_removed_clears_exposure() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        join_group(&mut service, dev(1), GroupId(4));
        super::test_util::set_audio_conf(&mut service, GroupId(4), 1, 4);
        super::test_util::activate_group(&mut service, dev(1), GroupId(4));

        service.audio_device_removed(dev(1), true);
        assert_eq!(service.active_devices(), [None, None]);
        let notifications = service.take_notifications();
        assert!(notifications.contains(&Notification::ActiveDevice { device: None }));
    }
}

//! Group registry
//!
//! Coordinated-set membership, per-group audio configuration, health-based
//! recommendations, and stream status. Membership lives on the device
//! descriptors; group views are derived from them, so a device can never be
//! in two groups at once.

use super::{GroupDescriptor, LeAudioService};
use crate::constants::{AUDIO_DIRECTION_INPUT, AUDIO_DIRECTION_OUTPUT};
use crate::hooks::SystemHooks;
use crate::stack::{
    AudioContexts, AudioDirections, GroupNodeStatus, GroupStreamStatus, HealthAction, PeerCommand,
};
use crate::{DeviceAddress, GroupId, Notification, ServiceIntent};

impl<H: SystemHooks> LeAudioService<H> {
    pub(crate) fn on_group_node(
        &mut self,
        device: DeviceAddress,
        group: GroupId,
        status: GroupNodeStatus,
    ) {
        match status {
            GroupNodeStatus::Added => {
                let Some(desc) = self.devices.get_mut(&device) else {
                    defmt::debug!("[SERVICE] node added for untracked device {}", device);
                    return;
                };
                if desc.group == Some(group) {
                    return;
                }
                desc.group = Some(group);
                if !self.groups.contains_key(&group)
                    && self.groups.insert(group, GroupDescriptor::default()).is_err()
                {
                    defmt::error!("[SERVICE] group table full for group {}", group.0);
                }
                self.effects
                    .notifications
                    .push(Notification::GroupNode {
                        device,
                        group,
                        status,
                    })
                    .ok();
                self.authorization
                    .maybe_authorize(device, true, &mut self.effects.intents);
            }
            GroupNodeStatus::Removed => {
                let Some(desc) = self.devices.get_mut(&device) else {
                    return;
                };
                if desc.group != Some(group) {
                    return;
                }
                desc.group = None;
                self.effects
                    .notifications
                    .push(Notification::GroupNode {
                        device,
                        group,
                        status,
                    })
                    .ok();
                self.authorization
                    .deauthorize(device, &mut self.effects.intents);
                if self.active_group == Some(group) && self.is_exposed_active(device) {
                    self.handle_group_deactivated(group, false);
                }
            }
        }
    }

    pub(crate) fn on_audio_conf(
        &mut self,
        group: GroupId,
        directions: AudioDirections,
        sink_location: u32,
        source_location: u32,
        contexts: AudioContexts,
    ) {
        if !self.groups.contains_key(&group)
            && self.groups.insert(group, GroupDescriptor::default()).is_err()
        {
            defmt::error!("[SERVICE] group table full, dropping conf for {}", group.0);
            return;
        }
        let Some(desc) = self.groups.get_mut(&group) else {
            return;
        };
        let previous_directions = desc.directions;
        let unchanged = desc.directions == directions
            && desc.sink_location == sink_location
            && desc.source_location == source_location
            && desc.available_contexts == contexts;
        let wants_reactivation = self.reactivate_on_contexts == Some(group);
        if unchanged && !wants_reactivation {
            return;
        }
        desc.directions = directions;
        desc.sink_location = sink_location;
        desc.source_location = source_location;
        desc.available_contexts = contexts;

        if self.active_group == Some(group) {
            if contexts == 0 {
                // Issued once; repeats of the zero-context conf are absorbed
                if !wants_reactivation {
                    defmt::debug!(
                        "[SERVICE] group {} lost all contexts, deactivating",
                        group.0
                    );
                    self.effects
                        .peer
                        .push(PeerCommand::SetActiveGroup(None))
                        .ok();
                }
                self.reactivate_on_contexts = Some(group);
                self.pending_active_group = None;
                return;
            }
            if previous_directions != directions {
                self.reroute_direction_delta(group, previous_directions, directions);
            }
        } else if wants_reactivation && contexts != 0 {
            defmt::debug!("[SERVICE] contexts back for group {}, reactivating", group.0);
            self.reactivate_on_contexts = None;
            if self.broadcast_in_progress() {
                self.broadcast_fallback = Some(group);
            } else {
                self.effects
                    .peer
                    .push(PeerCommand::SetActiveGroup(Some(group)))
                    .ok();
                self.pending_active_group = Some(group);
            }
        }
    }

    /// One routing update per direction that appeared or vanished, never a
    /// full re-activation.
    fn reroute_direction_delta(
        &mut self,
        group: GroupId,
        previous: AudioDirections,
        current: AudioDirections,
    ) {
        let lead = self.connected_group_lead_device(group);
        let volume = self.hooks.group_volume(group);
        let added = current & !previous;
        let removed = previous & !current;
        for (bit, output) in [(AUDIO_DIRECTION_OUTPUT, true), (AUDIO_DIRECTION_INPUT, false)] {
            if removed & bit != 0
                && let Some(update) = self.routing.clear(output, volume, true)
            {
                self.effects.routing.push(update).ok();
            }
            if added & bit != 0
                && let Some(device) = lead
            {
                let config = self.codecs.current(group, output);
                if let Some(update) =
                    self.routing.expose(output, device, config.as_ref(), volume, true)
                {
                    self.effects.routing.push(update).ok();
                }
            }
        }
    }

    pub(crate) fn on_group_stream_status(&mut self, group: GroupId, status: GroupStreamStatus) {
        self.effects
            .notifications
            .push(Notification::GroupStreamStatus { group, status })
            .ok();
        if status == GroupStreamStatus::Idle && self.hfp_handover_device.is_some() {
            self.handle_group_idle_during_call();
        }
    }

    /// Remember the device a call is being handed over to HFP for
    pub fn set_hfp_handover_device(&mut self, device: Option<DeviceAddress>) {
        self.hfp_handover_device = device;
    }

    /// The active group went idle while a call is handed over to HFP.
    ///
    /// Brings up the HFP audio path when the headset already points at the
    /// handover target, otherwise re-points the headset first.
    pub fn handle_group_idle_during_call(&mut self) {
        let Some(target) = self.hfp_handover_device.take() else {
            return;
        };
        if self.hooks.headset_active_device() == Some(target) {
            self.effects
                .intents
                .push(ServiceIntent::ConnectHeadsetAudio)
                .ok();
        } else {
            self.effects
                .intents
                .push(ServiceIntent::SetHeadsetActiveDevice(target))
                .ok();
        }
    }

    pub(crate) fn on_health_group_recommendation(&mut self, group: GroupId, action: HealthAction) {
        match action {
            HealthAction::Disable => {
                defmt::debug!("[SERVICE] ignoring disable recommendation for group {}", group.0);
            }
            HealthAction::InactivateGroup => {
                if self.active_group != Some(group) {
                    return;
                }
                let members = self.group_devices(group);
                if self.hooks.any_member_receiving_broadcast(&members) {
                    defmt::debug!(
                        "[SERVICE] group {} has a broadcast receiver, deferring inactivation",
                        group.0
                    );
                    return;
                }
                self.effects
                    .peer
                    .push(PeerCommand::SetActiveGroup(None))
                    .ok();
                self.handle_group_deactivated(group, false);
                self.reactivate_on_contexts = Some(group);
            }
        }
    }
}

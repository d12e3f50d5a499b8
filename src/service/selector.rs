//! Active Device Selector
//!
//! Selection is two-phase: a request marks the group pending and asks the
//! native stack to activate it, and only the stack's `GroupStatus`
//! confirmation flips the session state and exposes routes. The audio
//! framework therefore never sees a device the stack is not actually
//! prepared to stream to.

use super::LeAudioService;
use crate::constants::{
    AUDIO_DIRECTION_INPUT, AUDIO_DIRECTION_OUTPUT, CONTEXTS_ALL, CONTEXT_RINGTONE,
};
use crate::hooks::SystemHooks;
use crate::stack::{AudioContexts, GroupStatus, PeerCommand};
use crate::{ConnectionState, DeviceAddress, GroupId, Notification, ServiceIntent};

impl<H: SystemHooks> LeAudioService<H> {
    /// Select the device (really its whole group) exposed to the audio
    /// framework, or deselect with `None`.
    ///
    /// Returns whether the request was accepted. Acceptance means the
    /// selection will happen once the native stack confirms it, not that it
    /// already has.
    pub fn set_active_device(&mut self, device: Option<DeviceAddress>) -> bool {
        match device {
            Some(device) => self.activate_device(device),
            None => self.deactivate_current(),
        }
    }

    fn activate_device(&mut self, device: DeviceAddress) -> bool {
        let Some(desc) = self.devices.get(&device) else {
            defmt::warn!("[SERVICE] set active for untracked device {}", device);
            return false;
        };
        let Some(group) = desc.group else {
            defmt::warn!("[SERVICE] set active for ungrouped device {}", device);
            return false;
        };
        let state = desc.state;

        if self.broadcast_in_progress() {
            // The unicast group must not preempt the broadcast. Remember it
            // and restore once the last broadcast is gone.
            defmt::debug!(
                "[SERVICE] broadcast in progress, group {} becomes the fallback",
                group.0
            );
            self.broadcast_fallback = Some(group);
            return true;
        }
        if state != ConnectionState::Connected {
            return false;
        }
        let contexts = self
            .groups
            .get(&group)
            .map_or(0, |g| g.available_contexts);
        if contexts == 0 {
            // Cannot activate yet, but the caller's intent survives until
            // the group regains a context
            defmt::debug!(
                "[SERVICE] group {} has no available contexts, deferring activation",
                group.0
            );
            self.reactivate_on_contexts = Some(group);
            return false;
        }
        if self.active_group == Some(group) {
            // Already what the framework sees, just re-announce it
            if let Some(lead) = self.connected_group_lead_device(group) {
                self.effects
                    .notifications
                    .push(Notification::ActiveDevice { device: Some(lead) })
                    .ok();
            }
            return true;
        }
        if self.pending_active_group == Some(group) {
            return true;
        }
        // A group switch goes straight to the new group. The stack responds
        // with Inactive for the old one and Active for the new one.
        self.pending_active_group = Some(group);
        self.effects
            .peer
            .push(PeerCommand::SetActiveGroup(Some(group)))
            .ok();
        true
    }

    fn deactivate_current(&mut self) -> bool {
        if self.broadcast_in_progress() {
            self.broadcast_fallback = None;
            return true;
        }
        let had = self.active_group.is_some() || self.pending_active_group.is_some();
        if had {
            self.effects
                .peer
                .push(PeerCommand::SetActiveGroup(None))
                .ok();
        }
        self.pending_active_group = None;
        self.reactivate_on_contexts = None;
        had
    }

    pub(crate) fn on_group_status(&mut self, group: GroupId, status: GroupStatus) {
        self.effects
            .notifications
            .push(Notification::GroupStatus { group, status })
            .ok();
        match status {
            GroupStatus::Active => self.handle_group_activated(group),
            GroupStatus::Inactive => {
                // Another activation taking over right away means the
                // framework should not hear the gap
                let suppress =
                    self.pending_active_group.is_some() || self.broadcast_in_progress();
                self.handle_group_deactivated(group, suppress);
            }
        }
    }

    /// The native stack confirmed `group` is active: expose its lead device
    /// to the audio framework and register inband ringtone where available.
    fn handle_group_activated(&mut self, group: GroupId) {
        if self.active_group == Some(group) {
            return;
        }
        self.active_group = Some(group);
        if self.pending_active_group == Some(group) {
            self.pending_active_group = None;
        }
        self.reactivate_on_contexts = None;
        if let Some(desc) = self.groups.get_mut(&group) {
            desc.active = true;
        }
        let Some(lead) = self.connected_group_lead_device(group) else {
            defmt::warn!(
                "[SERVICE] group {} reported active with no connected member",
                group.0
            );
            return;
        };
        defmt::debug!("[SERVICE] group {} active, lead {}", group.0, lead);
        self.effects
            .notifications
            .push(Notification::ActiveDevice { device: Some(lead) })
            .ok();

        let (directions, contexts) = self
            .groups
            .get(&group)
            .map_or((0, 0), |g| (g.directions, g.available_contexts));
        let volume = self.hooks.group_volume(group);
        for (bit, output) in [(AUDIO_DIRECTION_OUTPUT, true), (AUDIO_DIRECTION_INPUT, false)] {
            if directions & bit != 0 {
                let config = self.codecs.current(group, output);
                if let Some(update) =
                    self.routing.expose(output, lead, config.as_ref(), volume, true)
                {
                    self.effects.routing.push(update).ok();
                }
            }
        }

        if contexts & CONTEXT_RINGTONE != 0 {
            for member in self.effectively_connected_members(group) {
                self.effects
                    .intents
                    .push(ServiceIntent::SetInbandRingtone(member))
                    .ok();
            }
            if let Some(desc) = self.groups.get_mut(&group) {
                desc.ringtone_registered = true;
            }
        }
    }

    /// Withdraw `group` from the audio framework.
    ///
    /// Safe to call when the group is not active. Restores whatever the
    /// activation changed: routes, inband ringtone registrations, and the
    /// allowed context mask.
    pub(crate) fn handle_group_deactivated(&mut self, group: GroupId, suppress_glitch: bool) {
        if self.active_group != Some(group) {
            return;
        }
        self.active_group = None;
        if let Some(desc) = self.groups.get_mut(&group) {
            desc.active = false;
        }
        defmt::debug!("[SERVICE] group {} inactive", group.0);

        let volume = self.hooks.group_volume(group);
        for output in [true, false] {
            if let Some(update) = self.routing.clear(output, volume, suppress_glitch) {
                self.effects.routing.push(update).ok();
            }
        }
        self.effects
            .notifications
            .push(Notification::ActiveDevice { device: None })
            .ok();

        let (ringtone, mask_set) = self
            .groups
            .get(&group)
            .map_or((false, false), |g| (g.ringtone_registered, g.allowed_mask_set));
        if ringtone {
            for member in self.group_devices(group) {
                self.effects
                    .intents
                    .push(ServiceIntent::ClearInbandRingtone(member))
                    .ok();
            }
            if let Some(desc) = self.groups.get_mut(&group) {
                desc.ringtone_registered = false;
            }
        }
        if mask_set {
            self.effects
                .peer
                .push(PeerCommand::SetGroupAllowedContextMask {
                    group,
                    sink: CONTEXTS_ALL,
                    source: CONTEXTS_ALL,
                })
                .ok();
            if let Some(desc) = self.groups.get_mut(&group) {
                desc.allowed_mask_set = false;
            }
        }
    }

    /// Restrict the contexts the active (or activating) group may stream.
    ///
    /// The restriction is undone automatically when the group deactivates.
    pub fn set_active_group_allowed_context_mask(
        &mut self,
        sink: AudioContexts,
        source: AudioContexts,
    ) -> bool {
        let Some(group) = self.active_group.or(self.pending_active_group) else {
            return false;
        };
        if let Some(desc) = self.groups.get_mut(&group) {
            desc.allowed_mask_set = true;
        }
        self.effects
            .peer
            .push(PeerCommand::SetGroupAllowedContextMask {
                group,
                sink,
                source,
            })
            .ok();
        true
    }
}

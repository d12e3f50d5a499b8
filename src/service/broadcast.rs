//! Broadcast/Unicast Coordination
//!
//! While at least one broadcast session exists the broadcast owns the audio
//! path: unicast activation requests only update the fallback group, and no
//! `SetActiveGroup` command reaches the native stack. When the last session
//! is destroyed the fallback group is re-activated through the normal
//! selection flow.

use super::LeAudioService;
use crate::ServiceIntent;
use crate::hooks::SystemHooks;

impl<H: SystemHooks> LeAudioService<H> {
    /// Whether at least one broadcast session exists
    #[must_use]
    pub fn broadcast_in_progress(&self) -> bool {
        !self.broadcast_sessions.is_empty()
    }

    pub(crate) fn on_broadcast_created(&mut self, broadcast_id: u32, success: bool) {
        if !success {
            defmt::warn!("[SERVICE] broadcast {} creation failed", broadcast_id);
            return;
        }
        if self.broadcast_sessions.contains(&broadcast_id) {
            return;
        }
        if self.broadcast_sessions.is_empty() {
            // First session takes over from unicast. The stack deactivates
            // the group itself; we only remember where to come back to.
            self.broadcast_fallback = self.active_group.or(self.pending_active_group);
            if let Some(group) = self.broadcast_fallback {
                defmt::debug!(
                    "[SERVICE] broadcast {} preempts unicast group {}",
                    broadcast_id,
                    group.0
                );
            }
        }
        if self.broadcast_sessions.push(broadcast_id).is_err() {
            defmt::error!("[SERVICE] broadcast table full, dropping {}", broadcast_id);
        }
    }

    pub(crate) fn on_broadcast_destroyed(&mut self, broadcast_id: u32) {
        self.broadcast_sessions.retain(|id| *id != broadcast_id);
        if !self.broadcast_sessions.is_empty() {
            return;
        }
        let Some(group) = self.broadcast_fallback.take() else {
            return;
        };
        let Some(lead) = self.connected_group_lead_device(group) else {
            defmt::debug!(
                "[SERVICE] fallback group {} has no connected member, staying inactive",
                group.0
            );
            return;
        };
        defmt::debug!("[SERVICE] last broadcast gone, restoring group {}", group.0);
        self.set_active_device(Some(lead));
    }

    /// Apply `volume` to the group currently carrying audio.
    ///
    /// With unicast that is the active (or activating) group. During a
    /// broadcast the volume goes to the fallback group, and only while at
    /// least one of its sinks is actually synced to the broadcast.
    pub fn set_volume(&mut self, volume: u8) -> bool {
        if let Some(group) = self.active_group.or(self.pending_active_group) {
            self.effects
                .intents
                .push(ServiceIntent::SetGroupVolume { group, volume })
                .ok();
            return true;
        }
        if self.broadcast_in_progress()
            && let Some(group) = self.broadcast_fallback
            && self.hooks.has_synced_broadcast_sinks()
        {
            self.effects
                .intents
                .push(ServiceIntent::SetGroupVolume { group, volume })
                .ok();
            return true;
        }
        false
    }
}

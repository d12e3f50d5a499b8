//! Companion Service Authorization
//!
//! The telephony and media control companion services must only talk to
//! devices that are part of a coordinated set while the adapter is enabled.
//! That rule lives here and nowhere else: the service feeds membership and
//! lifecycle changes in, the tracker decides which authorize/de-authorize
//! intents to emit, deduplicated by the set of currently authorized devices.

use crate::constants::MAX_EFFECTS;
use crate::{DeviceAddress, ServiceIntent};
use heapless::Vec;

/// Tracks which devices are authorized towards the companion services
#[derive(Debug, Default)]
pub struct AuthorizationTracker {
    enabled: bool,
    authorized: Vec<DeviceAddress, { crate::constants::MAX_DEVICES }>,
}

impl AuthorizationTracker {
    /// Create a tracker in the disabled state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the adapter has been reported enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Mark the adapter enabled; the caller sweeps known devices afterwards
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Authorize `device` if the rule allows it and it is not yet authorized
    pub fn maybe_authorize(
        &mut self,
        device: DeviceAddress,
        grouped: bool,
        intents: &mut Vec<ServiceIntent, MAX_EFFECTS>,
    ) {
        if !self.enabled || !grouped || self.authorized.contains(&device) {
            return;
        }
        if self.authorized.push(device).is_err() {
            defmt::error!("[AUTH] authorized set full, skipping {}", device);
            return;
        }
        intents.push(ServiceIntent::Authorize(device)).ok();
    }

    /// Withdraw authorization from `device` if it holds one
    pub fn deauthorize(
        &mut self,
        device: DeviceAddress,
        intents: &mut Vec<ServiceIntent, MAX_EFFECTS>,
    ) {
        if let Some(pos) = self.authorized.iter().position(|d| *d == device) {
            self.authorized.swap_remove(pos);
            intents.push(ServiceIntent::Deauthorize(device)).ok();
        }
    }

    /// Drop all companion records for an unbonded `device`.
    ///
    /// Unlike [`Self::deauthorize`] this always emits, because the companion
    /// services keep per-device records independent of the authorized flag.
    pub fn forget(&mut self, device: DeviceAddress, intents: &mut Vec<ServiceIntent, MAX_EFFECTS>) {
        if let Some(pos) = self.authorized.iter().position(|d| *d == device) {
            self.authorized.swap_remove(pos);
        }
        intents.push(ServiceIntent::Deauthorize(device)).ok();
    }
}

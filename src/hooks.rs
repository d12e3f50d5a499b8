//! Platform Query Surface
//!
//! The service needs a handful of synchronous, read-only answers from the
//! rest of the system: bond state, connection policy, whether a device
//! advertises the LE Audio service, group volume, and broadcast sink sync
//! state. [`SystemHooks`] is the seam the embedder implements; the service
//! never mutates anything through it.

use crate::{DeviceAddress, GroupId};

/// Bond (pairing) state of a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondState {
    /// Not bonded
    None,
    /// Bonding in progress
    Bonding,
    /// Bonded
    Bonded,
}

/// Stored connection policy for a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPolicy {
    /// No policy recorded, connections are allowed
    Unknown,
    /// Connections are allowed
    Allowed,
    /// Connections are forbidden
    Forbidden,
}

/// Read-only queries the service makes against the platform
pub trait SystemHooks {
    /// Bond state of `device`
    fn bond_state(&self, device: DeviceAddress) -> BondState;

    /// Connection policy recorded for `device`
    fn connection_policy(&self, device: DeviceAddress) -> ConnectionPolicy;

    /// Whether `device` advertises the LE Audio service
    fn provides_audio_service(&self, device: DeviceAddress) -> bool;

    /// Current volume of `group`, `None` when volume control is unavailable
    fn group_volume(&self, group: GroupId) -> Option<u8>;

    /// Whether any of `members` is currently receiving a synced broadcast
    fn any_member_receiving_broadcast(&self, members: &[DeviceAddress]) -> bool;

    /// Whether any broadcast sink is currently synced to a local broadcast
    fn has_synced_broadcast_sinks(&self) -> bool;

    /// Active device of the HFP headset profile, if any
    fn headset_active_device(&self) -> Option<DeviceAddress>;
}

#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(dead_code, clippy::unused_async, clippy::too_many_lines)]

mod address;
pub mod api;
pub mod authorize;
pub mod codec;
pub mod constants;
pub mod hooks;
pub mod processor;
pub mod routing;
mod service;
pub mod stack;

use crate::codec::CodecStatus;
use crate::constants::{DEFAULT_CONNECT_TIMEOUT_MS, MAX_CHANNELS, MAX_DEVICES};
use crate::hooks::ConnectionPolicy;
use crate::stack::{
    AudioContexts, GroupNodeStatus, GroupStatus, GroupStreamStatus, StackEvent,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

pub use address::DeviceAddress;
pub use service::LeAudioService;

pub(crate) static STACK_EVENT_CHANNEL: Channel<CriticalSectionRawMutex, StackEvent, MAX_CHANNELS> =
    Channel::new();

pub(crate) static REQUEST_CHANNEL: Channel<CriticalSectionRawMutex, Request, MAX_CHANNELS> =
    Channel::new();

pub(crate) static RESPONSE_CHANNEL: Channel<CriticalSectionRawMutex, Response, MAX_CHANNELS> =
    Channel::new();

/// Identifier of a coordinated-set group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, defmt::Format)]
pub struct GroupId(pub u8);

/// Connection lifecycle state of an LE Audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none in progress
    Disconnected,
    /// Connection establishment in progress
    Connecting,
    /// Connected and available for audio
    Connected,
    /// Teardown in progress
    Disconnecting,
}

/// LE Audio coordinator errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeAudioError {
    /// The native stack has not reported initialization yet
    NotInitialized,
    /// Device with the given address is not tracked
    DeviceNotFound,
    /// Device is not connected
    DeviceNotConnected,
    /// The request was refused (admission, state, or eligibility check)
    Refused,
    /// Invalid device state for the requested operation
    InvalidState,
    /// No group is currently active
    NoActiveGroup,
    /// Invalid parameter provided (e.g., malformed address)
    InvalidParameter,
    /// A capacity-bounded table is full
    CapacityExceeded,
    /// The native stack rejected or failed a command
    NativeCommandFailed,
    /// An unexpected response arrived on the API channel
    UnexpectedResponse,
}

/// Options for configuring a [`LeAudioService`] instance
///
/// # Examples
///
/// ```rust
/// use ptarmigan::HostOptions;
///
/// // Use default options
/// let default_options = HostOptions::default();
///
/// // Shorter connect watchdog for fast-failing UX
/// let impatient = HostOptions {
///     connect_timeout_ms: 5_000,
/// };
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HostOptions {
    /// Connect watchdog timeout in milliseconds
    ///
    /// A device still `Connecting` when the deadline fires is forced back to
    /// `Disconnected` with a notification.
    pub connect_timeout_ms: u32,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

/// Notifications delivered to profile observers
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A device connection changed state
    ConnectionState {
        /// Remote device
        device: DeviceAddress,
        /// State before the change
        previous: ConnectionState,
        /// State after the change
        state: ConnectionState,
    },
    /// The device exposed to the audio framework changed
    ActiveDevice {
        /// New active device, `None` when no group is active
        device: Option<DeviceAddress>,
    },
    /// A group activation state change was confirmed
    GroupStatus {
        /// Group the status applies to
        group: GroupId,
        /// New activation state
        status: GroupStatus,
    },
    /// A group streaming state change was reported
    GroupStreamStatus {
        /// Group the status applies to
        group: GroupId,
        /// New streaming state
        status: GroupStreamStatus,
    },
    /// A device joined or left a group
    GroupNode {
        /// Remote device
        device: DeviceAddress,
        /// Group the membership change applies to
        group: GroupId,
        /// Added or removed
        status: GroupNodeStatus,
    },
    /// The codec snapshot of a group changed
    CodecConfig {
        /// Group the snapshot applies to
        group: GroupId,
        /// Coherent codec snapshot
        status: CodecStatus,
    },
}

/// Side effects aimed at companion services and system profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceIntent {
    /// Authorize the device towards the telephony/media companion services
    Authorize(DeviceAddress),
    /// Withdraw companion service authorization and records
    Deauthorize(DeviceAddress),
    /// Register the device for inband ringtone rendering
    SetInbandRingtone(DeviceAddress),
    /// Drop the device's inband ringtone registration
    ClearInbandRingtone(DeviceAddress),
    /// Apply a volume to every member of a group
    SetGroupVolume {
        /// Target group
        group: GroupId,
        /// Absolute volume
        volume: u8,
    },
    /// Ask the HFP profile to bring up its audio path
    ConnectHeadsetAudio,
    /// Re-point the HFP profile's active device
    SetHeadsetActiveDevice(DeviceAddress),
}

/// API requests sent to the processor task
#[derive(Debug, Clone, Copy)]
pub(crate) enum Request {
    /// Connect a device
    Connect(DeviceAddress),
    /// Disconnect a device
    Disconnect(DeviceAddress),
    /// Select the active device, `None` to deactivate
    SetActiveDevice(Option<DeviceAddress>),
    /// Apply a volume to the active (or broadcast primary) group
    SetVolume(u8),
    /// Record a connection policy and act on it
    SetConnectionPolicy(DeviceAddress, ConnectionPolicy),
    /// Restrict the active group's allowed contexts
    SetAllowedContextMask {
        /// Allowed sink contexts
        sink: AudioContexts,
        /// Allowed source contexts
        source: AudioContexts,
    },
    /// Get the connection state of a device
    GetConnectionState(DeviceAddress),
    /// Get all connected devices
    GetConnectedDevices,
    /// Get the devices exposed to the audio framework, output then input
    GetActiveDevices,
    /// Get the codec snapshot of a group
    GetCodecStatus(GroupId),
}


/// API responses sent back from the processor task
#[derive(Debug, Clone)]
pub(crate) enum Response {
    /// Boolean outcome of a command request
    Ack(bool),
    /// Connection state of the queried device
    ConnectionState(ConnectionState),
    /// Device list result
    Devices(Vec<DeviceAddress, MAX_DEVICES>),
    /// Exposed audio devices, output then input
    ActiveDevices([Option<DeviceAddress>; 2]),
    /// Codec snapshot of the queried group
    CodecStatus(CodecStatus),
    /// Error occurred
    Error(LeAudioError),
}

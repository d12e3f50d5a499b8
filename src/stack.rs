//! Native Stack Interface - events from and commands to the LE Audio stack
//!
//! The native LE Audio stack is a black-box peer: it reports what happened
//! through [`StackEvent`] values and accepts [`PeerCommand`] values. Each
//! event kind is its own variant carrying exactly the fields that kind
//! defines, so handlers match on the variant instead of probing optional
//! fields. Adapters that bridge to a C stack own any sentinel conversion
//! (`-1` group ids, empty codec configs); inside the crate absence is always
//! `Option`.

use crate::codec::CodecConfig;
use crate::constants::MAX_CODEC_CONFIGS;
use crate::{ConnectionState, DeviceAddress, GroupId, STACK_EVENT_CHANNEL};
use heapless::Vec;

/// Bitmask of audio directions (output/input), see `AUDIO_DIRECTION_*`
pub type AudioDirections = u8;

/// Bitmask of available audio context types, see `CONTEXT_*`
pub type AudioContexts = u16;

/// Membership change reported for a coordinated-set group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupNodeStatus {
    /// Device joined the group
    Added,
    /// Device left the group
    Removed,
}

/// Activation state reported for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// Group owns the unicast audio path
    Active,
    /// Group released the unicast audio path
    Inactive,
}

/// Streaming state reported for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStreamStatus {
    /// No stream is running
    Idle,
    /// Audio is streaming
    Streaming,
}

/// Health-based recommendation issued by the native stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAction {
    /// Stop using the device/group entirely (tolerated no-op)
    Disable,
    /// Deactivate the group to recover stream health
    InactivateGroup,
}

/// Events reported by the native LE Audio stack
#[derive(Debug, Clone, PartialEq)]
pub enum StackEvent {
    /// The native stack finished initializing and accepts commands
    Initialized,
    /// A device connection moved to a new state
    ConnectionState {
        /// Remote device
        device: DeviceAddress,
        /// New connection state
        state: ConnectionState,
    },
    /// A device joined or left a coordinated-set group
    GroupNode {
        /// Remote device
        device: DeviceAddress,
        /// Group the membership change applies to
        group: GroupId,
        /// Added or removed
        status: GroupNodeStatus,
    },
    /// A group was activated or deactivated
    GroupStatus {
        /// Group the status applies to
        group: GroupId,
        /// New activation state
        status: GroupStatus,
    },
    /// A group started or stopped streaming
    GroupStreamStatus {
        /// Group the status applies to
        group: GroupId,
        /// New streaming state
        status: GroupStreamStatus,
    },
    /// The audio configuration of a group changed
    AudioConf {
        /// Device the report came from, if any
        device: Option<DeviceAddress>,
        /// Directions the group supports
        directions: AudioDirections,
        /// Group the configuration applies to
        group: GroupId,
        /// Sink audio location bitmask
        sink_location: u32,
        /// Source audio location bitmask
        source_location: u32,
        /// Available audio context types
        available_contexts: AudioContexts,
    },
    /// The sink audio location of a device became known
    SinkAudioLocation {
        /// Remote device
        device: DeviceAddress,
        /// Audio location bitmask
        location: u32,
    },
    /// Local codec capabilities changed
    LocalCodecCapabilities {
        /// Input (capture) capabilities
        input: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
        /// Output (playback) capabilities
        output: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    },
    /// The current codec configuration of a group changed
    GroupCodecConfig {
        /// Group the configuration applies to
        group: GroupId,
        /// Current input config, `None` for output-only groups
        input: Option<CodecConfig>,
        /// Current output config, `None` for input-only groups
        output: Option<CodecConfig>,
    },
    /// The selectable codec configurations of a group changed
    GroupSelectableCodecConfig {
        /// Group the configurations apply to
        group: GroupId,
        /// Selectable input configs
        input: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
        /// Selectable output configs
        output: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    },
    /// Health-based recommendation for a single device
    HealthDeviceRecommendation {
        /// Remote device
        device: DeviceAddress,
        /// Recommended action
        action: HealthAction,
    },
    /// Health-based recommendation for a group
    HealthGroupRecommendation {
        /// Group the recommendation applies to
        group: GroupId,
        /// Recommended action
        action: HealthAction,
    },
    /// A broadcast session was created
    BroadcastCreated {
        /// Identifier of the broadcast session
        broadcast_id: u32,
        /// Whether creation succeeded
        success: bool,
    },
    /// A broadcast session was destroyed
    BroadcastDestroyed {
        /// Identifier of the broadcast session
        broadcast_id: u32,
    },
}

/// Commands issued to the native LE Audio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerCommand {
    /// Establish an ISO connection to a device
    ConnectDevice(DeviceAddress),
    /// Tear down the connection to a device
    DisconnectDevice(DeviceAddress),
    /// Select the active unicast group, `None` to deactivate
    SetActiveGroup(Option<GroupId>),
    /// Restrict the context types a group may stream
    SetGroupAllowedContextMask {
        /// Group the mask applies to
        group: GroupId,
        /// Allowed sink contexts
        sink: AudioContexts,
        /// Allowed source contexts
        source: AudioContexts,
    },
}

/// Deliver a stack event to the processor task.
///
/// Native stack adapters call this from their callback context; events are
/// serialized onto the single processor task in arrival order.
pub async fn deliver(event: StackEvent) {
    STACK_EVENT_CHANNEL.sender().send(event).await;
}

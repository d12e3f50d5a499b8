//! `Ptarmigan` API
//!
//! Async helpers for driving the coordinator from other tasks. Each helper
//! sends a request to the processor task and waits for the matching
//! response. Requests are answered strictly in order, one at a time.

use crate::codec::CodecStatus;
use crate::constants::MAX_DEVICES;
use crate::hooks::ConnectionPolicy;
use crate::stack::AudioContexts;
use crate::{
    ConnectionState, DeviceAddress, GroupId, LeAudioError, REQUEST_CHANNEL, RESPONSE_CHANNEL,
    Request, Response,
};
use heapless::Vec;

async fn request(request: Request) -> Response {
    REQUEST_CHANNEL.sender().send(request).await;
    RESPONSE_CHANNEL.receiver().receive().await
}

async fn command(req: Request) -> Result<(), LeAudioError> {
    match request(req).await {
        Response::Ack(true) => Ok(()),
        Response::Ack(false) => Err(LeAudioError::Refused),
        Response::Error(e) => Err(e),
        _ => Err(LeAudioError::UnexpectedResponse),
    }
}

/// Connect an LE Audio device
///
/// # Errors
///
/// Returns [`LeAudioError::Refused`] when the native stack is not
/// initialized, the device is not bonded, its policy forbids connections,
/// it does not advertise the LE Audio service, or a connection already
/// exists.
pub async fn connect_device(device: DeviceAddress) -> Result<(), LeAudioError> {
    command(Request::Connect(device)).await
}

/// Disconnect an LE Audio device
///
/// # Errors
///
/// Returns [`LeAudioError::Refused`] when the device is untracked or has no
/// connection to tear down.
pub async fn disconnect_device(device: DeviceAddress) -> Result<(), LeAudioError> {
    command(Request::Disconnect(device)).await
}

/// Select the device whose group should carry unicast audio
///
/// # Errors
///
/// Returns [`LeAudioError::Refused`] when the device is untracked,
/// ungrouped, not connected, or its group has no available contexts.
pub async fn set_active_device(device: DeviceAddress) -> Result<(), LeAudioError> {
    command(Request::SetActiveDevice(Some(device))).await
}

/// Deselect the active device, releasing the unicast audio path
///
/// # Errors
///
/// Returns [`LeAudioError::Refused`] when no group was active or pending.
pub async fn remove_active_device() -> Result<(), LeAudioError> {
    command(Request::SetActiveDevice(None)).await
}

/// Apply a volume to the group currently carrying audio
///
/// # Errors
///
/// Returns [`LeAudioError::Refused`] when no group carries audio.
pub async fn set_volume(volume: u8) -> Result<(), LeAudioError> {
    command(Request::SetVolume(volume)).await
}

/// Record a connection policy for a device and act on it
///
/// # Errors
///
/// Returns an error when the processor rejects the request.
pub async fn set_connection_policy(
    device: DeviceAddress,
    policy: ConnectionPolicy,
) -> Result<(), LeAudioError> {
    command(Request::SetConnectionPolicy(device, policy)).await
}

/// Restrict the contexts the active group may stream
///
/// # Errors
///
/// Returns [`LeAudioError::Refused`] when no group is active or pending.
pub async fn set_allowed_context_mask(
    sink: AudioContexts,
    source: AudioContexts,
) -> Result<(), LeAudioError> {
    command(Request::SetAllowedContextMask { sink, source }).await
}

/// Get the connection state of a device
///
/// # Errors
///
/// Returns [`LeAudioError::UnexpectedResponse`] when the processor answers
/// with anything but a connection state.
pub async fn get_connection_state(
    device: DeviceAddress,
) -> Result<ConnectionState, LeAudioError> {
    match request(Request::GetConnectionState(device)).await {
        Response::ConnectionState(state) => Ok(state),
        Response::Error(e) => Err(e),
        _ => Err(LeAudioError::UnexpectedResponse),
    }
}

/// Get all connected devices
///
/// # Errors
///
/// Returns [`LeAudioError::UnexpectedResponse`] when the processor answers
/// with anything but a device list.
pub async fn get_connected_devices() -> Result<Vec<DeviceAddress, MAX_DEVICES>, LeAudioError> {
    match request(Request::GetConnectedDevices).await {
        Response::Devices(devices) => Ok(devices),
        Response::Error(e) => Err(e),
        _ => Err(LeAudioError::UnexpectedResponse),
    }
}

/// Get the devices exposed to the audio framework, output then input
///
/// # Errors
///
/// Returns [`LeAudioError::UnexpectedResponse`] when the processor answers
/// with anything but the active device pair.
pub async fn get_active_devices() -> Result<[Option<DeviceAddress>; 2], LeAudioError> {
    match request(Request::GetActiveDevices).await {
        Response::ActiveDevices(devices) => Ok(devices),
        Response::Error(e) => Err(e),
        _ => Err(LeAudioError::UnexpectedResponse),
    }
}

/// Get the codec snapshot of a group
///
/// # Errors
///
/// Returns [`LeAudioError::UnexpectedResponse`] when the processor answers
/// with anything but a codec status.
pub async fn get_codec_status(group: GroupId) -> Result<CodecStatus, LeAudioError> {
    match request(Request::GetCodecStatus(group)).await {
        Response::CodecStatus(status) => Ok(status),
        Response::Error(e) => Err(e),
        _ => Err(LeAudioError::UnexpectedResponse),
    }
}

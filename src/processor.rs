//! Processor Task
//!
//! The single task that owns the [`LeAudioService`] state. It serializes
//! three input sources: events delivered by the native stack adapter, API
//! requests, and connect watchdog deadlines. After each input the queued
//! effects are drained to the embedder-provided sinks, so every consequence
//! of a message is out before the next message is looked at.

use crate::constants::MAX_PENDING_CONNECTS;
use crate::hooks::SystemHooks;
use crate::routing::RoutingUpdate;
use crate::stack::PeerCommand;
use crate::{
    DeviceAddress, LeAudioError, LeAudioService, Notification, REQUEST_CHANNEL, RESPONSE_CHANNEL,
    Request, Response, STACK_EVENT_CHANNEL, ServiceIntent,
};
use embassy_futures::select::{Either3, select3};
use embassy_time::{Duration, Instant, Timer};
use heapless::Deque;

/// Executor of commands against the native LE Audio stack
pub trait NativePeer {
    /// Execute one command
    ///
    /// # Errors
    ///
    /// Returns an error when the native stack rejects or fails the command.
    async fn execute(&mut self, command: PeerCommand) -> Result<(), LeAudioError>;
}

/// Receiver of routing changes aimed at the system audio framework
pub trait RoutingSink {
    /// Apply one routing update
    async fn active_device_changed(&mut self, update: RoutingUpdate);
}

/// Receiver of profile observer notifications
pub trait EventSink {
    /// Deliver one notification
    async fn notify(&mut self, notification: Notification);
}

/// Receiver of companion service and system profile intents
pub trait CompanionSink {
    /// Carry out one intent
    async fn handle(&mut self, intent: ServiceIntent);
}

/// Run the processor task.
///
/// Takes ownership of the service and never returns. Exactly one instance
/// must run; the API helpers in [`crate::api`] assume their requests reach
/// it.
pub async fn run<H, P, R, E, C>(
    mut service: LeAudioService<H>,
    mut peer: P,
    mut routing: R,
    mut events: E,
    mut companions: C,
) -> !
where
    H: SystemHooks,
    P: NativePeer,
    R: RoutingSink,
    E: EventSink,
    C: CompanionSink,
{
    defmt::debug!("[PROCESSOR] starting");
    let mut deadlines: Deque<(DeviceAddress, Instant), MAX_PENDING_CONNECTS> = Deque::new();
    loop {
        match select3(
            STACK_EVENT_CHANNEL.receiver().receive(),
            REQUEST_CHANNEL.receiver().receive(),
            next_deadline(&deadlines),
        )
        .await
        {
            Either3::First(event) => {
                service.message_from_native(event);
            }
            Either3::Second(request) => {
                let response = process_request(&mut service, request);
                RESPONSE_CHANNEL.sender().send(response).await;
            }
            Either3::Third(device) => {
                deadlines.pop_front();
                service.on_connect_timeout(device);
            }
        }
        drain_effects(
            &mut service,
            &mut deadlines,
            &mut peer,
            &mut routing,
            &mut events,
            &mut companions,
        )
        .await;
    }
}

/// Resolve once the earliest watchdog deadline fires.
///
/// Pends forever while no connect is outstanding. Deadlines share one
/// timeout, so the queue front is always the earliest.
async fn next_deadline(
    deadlines: &Deque<(DeviceAddress, Instant), MAX_PENDING_CONNECTS>,
) -> DeviceAddress {
    match deadlines.front().copied() {
        Some((device, at)) => {
            Timer::at(at).await;
            device
        }
        None => core::future::pending().await,
    }
}

fn process_request<H: SystemHooks>(service: &mut LeAudioService<H>, request: Request) -> Response {
    match request {
        Request::Connect(device) => Response::Ack(service.connect(device)),
        Request::Disconnect(device) => Response::Ack(service.disconnect(device)),
        Request::SetActiveDevice(device) => Response::Ack(service.set_active_device(device)),
        Request::SetVolume(volume) => Response::Ack(service.set_volume(volume)),
        Request::SetConnectionPolicy(device, policy) => {
            Response::Ack(service.set_connection_policy(device, policy))
        }
        Request::SetAllowedContextMask { sink, source } => {
            Response::Ack(service.set_active_group_allowed_context_mask(sink, source))
        }
        Request::GetConnectionState(device) => {
            Response::ConnectionState(service.connection_state(device))
        }
        Request::GetConnectedDevices => Response::Devices(service.connected_devices()),
        Request::GetActiveDevices => Response::ActiveDevices(service.active_devices()),
        Request::GetCodecStatus(group) => Response::CodecStatus(service.codec_status(group)),
    }
}

async fn drain_effects<H, P, R, E, C>(
    service: &mut LeAudioService<H>,
    deadlines: &mut Deque<(DeviceAddress, Instant), MAX_PENDING_CONNECTS>,
    peer: &mut P,
    routing: &mut R,
    events: &mut E,
    companions: &mut C,
) where
    H: SystemHooks,
    P: NativePeer,
    R: RoutingSink,
    E: EventSink,
    C: CompanionSink,
{
    for command in service.take_peer_commands() {
        if let PeerCommand::ConnectDevice(device) = command {
            let timeout = Duration::from_millis(u64::from(service.options().connect_timeout_ms));
            if deadlines.push_back((device, Instant::now() + timeout)).is_err() {
                defmt::warn!("[PROCESSOR] watchdog queue full, no timeout for {}", device);
            }
        }
        if let Err(e) = peer.execute(command).await {
            defmt::error!(
                "[PROCESSOR] native command failed: {:?}",
                defmt::Debug2Format(&e)
            );
        }
    }
    for update in service.take_routing_updates() {
        routing.active_device_changed(update).await;
    }
    for notification in service.take_notifications() {
        events.notify(notification).await;
    }
    for intent in service.take_intents() {
        companions.handle(intent).await;
    }
}

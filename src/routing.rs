//! Audio Routing Bridge
//!
//! Translates group activation changes into the routing updates the system
//! audio framework consumes. The bridge remembers exactly what it last told
//! the framework for each direction (device plus effective audio
//! configuration) and emits updates only when that remembered value would
//! change, so duplicate events never double up routing churn.

use crate::DeviceAddress;
use crate::codec::CodecConfig;

/// How a routing change should be presented to the audio framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingProfile {
    /// Output (playback) direction when `true`, input (capture) otherwise
    pub output: bool,
    /// Group volume to restore, `None` when volume control is unavailable
    pub volume: Option<u8>,
    /// Suppress the audible gap when another route takes over immediately
    pub suppress_glitch: bool,
}

/// One routing change handed to the audio framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingUpdate {
    /// Device now carrying the direction, `None` when the route goes away
    pub new_device: Option<DeviceAddress>,
    /// Device that previously carried the direction
    pub old_device: Option<DeviceAddress>,
    /// Presentation details
    pub profile: RoutingProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExposedRoute {
    device: DeviceAddress,
    sample_rate_hz: Option<u32>,
    channel_count: Option<u8>,
}

/// Per-direction tracker of what the audio framework was last told
#[derive(Debug, Default)]
pub struct RoutingBridge {
    output: Option<ExposedRoute>,
    input: Option<ExposedRoute>,
}

impl RoutingBridge {
    /// Create a bridge with no exposed routes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Device currently exposed for a direction
    #[must_use]
    pub fn exposed_device(&self, output: bool) -> Option<DeviceAddress> {
        self.slot(output).map(|route| route.device)
    }

    /// Expose `device` for a direction.
    ///
    /// Returns the update to deliver, or `None` when the framework already
    /// sees this exact device and configuration.
    pub fn expose(
        &mut self,
        output: bool,
        device: DeviceAddress,
        config: Option<&CodecConfig>,
        volume: Option<u8>,
        suppress_glitch: bool,
    ) -> Option<RoutingUpdate> {
        let next = ExposedRoute {
            device,
            sample_rate_hz: config.map(|c| c.sample_rate_hz),
            channel_count: config.map(|c| c.channel_count),
        };
        let slot = self.slot_mut(output);
        if *slot == Some(next) {
            return None;
        }
        let old_device = slot.map(|route| route.device);
        *slot = Some(next);
        Some(RoutingUpdate {
            new_device: Some(device),
            old_device,
            profile: RoutingProfile {
                output,
                volume,
                suppress_glitch,
            },
        })
    }

    /// Remove the exposed route of a direction.
    ///
    /// Returns the teardown update, or `None` when nothing was exposed.
    pub fn clear(
        &mut self,
        output: bool,
        volume: Option<u8>,
        suppress_glitch: bool,
    ) -> Option<RoutingUpdate> {
        self.slot_mut(output).take().map(|route| RoutingUpdate {
            new_device: None,
            old_device: Some(route.device),
            profile: RoutingProfile {
                output,
                volume,
                suppress_glitch,
            },
        })
    }

    /// Re-announce the exposed route after its effective configuration changed.
    ///
    /// Returns `None` when nothing is exposed for the direction or the
    /// configuration is audibly identical to what was last sent.
    pub fn reconfigure(
        &mut self,
        output: bool,
        config: Option<&CodecConfig>,
        volume: Option<u8>,
    ) -> Option<RoutingUpdate> {
        let slot = self.slot_mut(output);
        let route = slot.as_mut()?;
        let sample_rate_hz = config.map(|c| c.sample_rate_hz);
        let channel_count = config.map(|c| c.channel_count);
        if route.sample_rate_hz == sample_rate_hz && route.channel_count == channel_count {
            return None;
        }
        route.sample_rate_hz = sample_rate_hz;
        route.channel_count = channel_count;
        let device = route.device;
        Some(RoutingUpdate {
            new_device: Some(device),
            old_device: Some(device),
            profile: RoutingProfile {
                output,
                volume,
                suppress_glitch: true,
            },
        })
    }

    /// Drop a direction's route without producing an update.
    ///
    /// Used when the audio framework itself reported the device gone.
    pub fn forget(&mut self, output: bool) {
        *self.slot_mut(output) = None;
    }

    fn slot(&self, output: bool) -> Option<&ExposedRoute> {
        if output {
            self.output.as_ref()
        } else {
            self.input.as_ref()
        }
    }

    fn slot_mut(&mut self, output: bool) -> &mut Option<ExposedRoute> {
        if output { &mut self.output } else { &mut self.input }
    }
}

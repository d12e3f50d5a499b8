//! Codec Configuration Cache
//!
//! The native stack reports codec information in three independent streams:
//! local capabilities, per-group selectable configurations, and the per-group
//! current configuration. Observers want one coherent snapshot, so the cache
//! folds all three together and [`CodecConfigCache::status`] assembles a
//! [`CodecStatus`] from the freshest values.
//!
//! Groups that only stream in one direction report `None` for the other
//! direction's current config and an empty selectable list.

use crate::GroupId;
use crate::constants::{MAX_CODEC_CONFIGS, MAX_GROUPS};
use heapless::{FnvIndexMap, Vec};

/// Codec identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// LC3, the LE Audio mandatory codec
    Lc3,
    /// Vendor-specific codec with its company identifier
    Vendor(u16),
}

/// A single codec configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Codec in use
    pub codec: CodecKind,
    /// Sample rate in Hz
    pub sample_rate_hz: u32,
    /// Bits per sample
    pub bits_per_sample: u8,
    /// Number of audio channels
    pub channel_count: u8,
    /// Frame duration in microseconds
    pub frame_duration_us: u32,
    /// Octets per codec frame
    pub octets_per_frame: u16,
}

impl CodecConfig {
    /// LC3 configuration with typical 10ms frames at 16 bits per sample
    #[must_use]
    pub const fn lc3(sample_rate_hz: u32, channel_count: u8, octets_per_frame: u16) -> Self {
        Self {
            codec: CodecKind::Lc3,
            sample_rate_hz,
            bits_per_sample: 16,
            channel_count,
            frame_duration_us: 10_000,
            octets_per_frame,
        }
    }

    /// Whether `other` would require re-routing audio if it replaced `self`
    #[must_use]
    pub fn differs_audibly(&self, other: &Self) -> bool {
        self.sample_rate_hz != other.sample_rate_hz || self.channel_count != other.channel_count
    }
}

/// Snapshot of everything known about a group's codec situation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodecStatus {
    /// Current input (capture) configuration
    pub input: Option<CodecConfig>,
    /// Current output (playback) configuration
    pub output: Option<CodecConfig>,
    /// Local input capabilities
    pub input_capabilities: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    /// Local output capabilities
    pub output_capabilities: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    /// Configurations selectable for the group's input direction
    pub input_selectable: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    /// Configurations selectable for the group's output direction
    pub output_selectable: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
}

#[derive(Debug, Default)]
struct GroupCodecState {
    input: Option<CodecConfig>,
    output: Option<CodecConfig>,
    input_selectable: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    output_selectable: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
}

/// Cache of local codec capabilities and per-group configurations
#[derive(Debug, Default)]
pub struct CodecConfigCache {
    input_capabilities: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    output_capabilities: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    groups: FnvIndexMap<GroupId, GroupCodecState, MAX_GROUPS>,
}

impl CodecConfigCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the local capability lists
    pub fn set_capabilities(
        &mut self,
        input: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
        output: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    ) {
        self.input_capabilities = input;
        self.output_capabilities = output;
    }

    /// Replace the selectable configuration lists of `group`
    pub fn set_selectable(
        &mut self,
        group: GroupId,
        input: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
        output: Vec<CodecConfig, MAX_CODEC_CONFIGS>,
    ) {
        let state = self.group_state(group);
        if let Some(state) = state {
            state.input_selectable = input;
            state.output_selectable = output;
        }
    }

    /// Replace the current configuration of `group`
    pub fn set_current(
        &mut self,
        group: GroupId,
        input: Option<CodecConfig>,
        output: Option<CodecConfig>,
    ) {
        let state = self.group_state(group);
        if let Some(state) = state {
            state.input = input;
            state.output = output;
        }
    }

    /// Current configuration of `group` for one direction
    #[must_use]
    pub fn current(&self, group: GroupId, output: bool) -> Option<CodecConfig> {
        let state = self.groups.get(&group)?;
        if output { state.output } else { state.input }
    }

    /// Assemble the codec snapshot for `group`
    ///
    /// Unknown groups yield a status with the local capabilities and nothing
    /// else; observers treat that the same as a one-direction group with no
    /// configuration yet.
    #[must_use]
    pub fn status(&self, group: GroupId) -> CodecStatus {
        let mut status = CodecStatus {
            input_capabilities: self.input_capabilities.clone(),
            output_capabilities: self.output_capabilities.clone(),
            ..CodecStatus::default()
        };
        if let Some(state) = self.groups.get(&group) {
            status.input = state.input;
            status.output = state.output;
            status.input_selectable = state.input_selectable.clone();
            status.output_selectable = state.output_selectable.clone();
        }
        status
    }

    /// Drop the cached state of `group`
    pub fn forget_group(&mut self, group: GroupId) {
        self.groups.remove(&group);
    }

    fn group_state(&mut self, group: GroupId) -> Option<&mut GroupCodecState> {
        if !self.groups.contains_key(&group)
            && self.groups.insert(group, GroupCodecState::default()).is_err()
        {
            defmt::error!("[CODEC] group table full, dropping update for group {}", group.0);
            return None;
        }
        self.groups.get_mut(&group)
    }
}

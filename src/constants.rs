//! `Ptarmigan` Constants
//!
//! This module contains all the constants used throughout the `Ptarmigan`
//! library. These constants define capacity limits, default values, and
//! LE Audio specific bitmask parameters used in the implementation.

use crate::stack::{AudioContexts, AudioDirections};

/// Maximum number of tracked LE Audio devices (must be a power of two)
pub const MAX_DEVICES: usize = 16;

/// Maximum number of coordinated-set groups (must be a power of two)
pub const MAX_GROUPS: usize = 8;

/// Maximum number of concurrent broadcast sessions
pub const MAX_BROADCASTS: usize = 4;

/// Depth of the request/response/stack-event channels
pub const MAX_CHANNELS: usize = 8;

/// Maximum number of codec configurations per capability/selectable list
pub const MAX_CODEC_CONFIGS: usize = 8;

/// Maximum number of queued effects of one kind per processed message
pub const MAX_EFFECTS: usize = 16;

/// Maximum number of outstanding connect watchdog deadlines
pub const MAX_PENDING_CONNECTS: usize = 8;

/// Default connect watchdog timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u32 = 30_000;

/// No audio direction
pub const AUDIO_DIRECTION_NONE: AudioDirections = 0x00;

/// Output (sink) audio direction bit
pub const AUDIO_DIRECTION_OUTPUT: AudioDirections = 0x01;

/// Input (source) audio direction bit
pub const AUDIO_DIRECTION_INPUT: AudioDirections = 0x02;

/// Unspecified audio context
pub const CONTEXT_UNSPECIFIED: AudioContexts = 0x0001;

/// Conversational audio context (phone calls)
pub const CONTEXT_CONVERSATIONAL: AudioContexts = 0x0002;

/// Media playback audio context
pub const CONTEXT_MEDIA: AudioContexts = 0x0004;

/// Game audio context
pub const CONTEXT_GAME: AudioContexts = 0x0008;

/// Instructional audio context
pub const CONTEXT_INSTRUCTIONAL: AudioContexts = 0x0010;

/// Voice assistant audio context
pub const CONTEXT_VOICE_ASSISTANTS: AudioContexts = 0x0020;

/// Live audio context
pub const CONTEXT_LIVE: AudioContexts = 0x0040;

/// Sound effects audio context
pub const CONTEXT_SOUND_EFFECTS: AudioContexts = 0x0080;

/// Notification audio context
pub const CONTEXT_NOTIFICATIONS: AudioContexts = 0x0100;

/// Ringtone audio context
pub const CONTEXT_RINGTONE: AudioContexts = 0x0200;

/// Alert audio context
pub const CONTEXT_ALERTS: AudioContexts = 0x0400;

/// Emergency alarm audio context
pub const CONTEXT_EMERGENCY_ALARM: AudioContexts = 0x0800;

/// All defined audio contexts
pub const CONTEXTS_ALL: AudioContexts = 0x0FFF;

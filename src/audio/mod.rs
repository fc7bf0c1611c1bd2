//! # Audio Module
//!
//! Playback orchestration: queue policy, the generation-token controller,
//! the idle watchdog, and the sink boundary.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue policy
//! - Ordered pending queue with bounded history
//! - Loop (off/single/queue) and shuffle selection
//! - Display snapshots with pagination
//!
//! ### [`controller`] - Playback state machine
//! - Play/skip/stop/previous transitions against the sink
//! - Generation tokens that make stale completions harmless
//! - Event pump that turns sink callbacks into queue advancement
//!
//! ### [`idle`] - Idle watchdog
//! - One supervised loop per connected guild
//! - Filler playback after the inactivity threshold, outside the
//!   generation protocol
//!
//! ### [`sink`] / [`voice_sink`] - Output boundary
//! - The [`sink::AudioSink`] trait the orchestrator drives
//! - A songbird-backed implementation for serenity bots

pub mod controller;
pub mod events;
pub mod idle;
pub mod queue;
pub mod sink;
pub mod voice_sink;

//! # playhead
//!
//! Per-guild playback orchestration for Discord music bots.
//!
//! The crate owns the part of a music bot that is easy to get wrong: the
//! per-guild queue and its loop/shuffle policy, the "play current, then
//! next" state machine that survives racing completion callbacks from the
//! audio backend, the idle background-music watchdog, and the registry
//! that keeps every guild's state isolated under concurrent command
//! handlers.
//!
//! Command parsing, the gateway session and the audio pipeline itself stay
//! outside: the orchestrator talks to them through [`AudioSink`] and
//! [`MediaResolver`]. A songbird-backed sink ([`VoiceSink`]) is included
//! so a serenity bot can wire a voice call straight in.
//!
//! ## Architecture
//!
//! - [`TenantRegistry`] maps guild ids to [`GuildSession`]s, created on
//!   demand. The map is the only structure shared across guilds.
//! - [`PlaybackController`] drives playback. Every stream start stamps a
//!   per-guild generation; completion notifications carrying an old
//!   generation are discarded, which makes skip/stop races harmless.
//! - [`IdleWatchdog`] runs one supervised loop per connected guild and
//!   injects filler audio from the [`MediaLibrary`] after 30 seconds of
//!   silence, without touching the real queue.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use playhead::{Config, MediaLibrary, PlaybackController, TenantRegistry};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Arc::new(Config::load()?);
//! let library = Arc::new(MediaLibrary::new(&config)?);
//! let registry = Arc::new(TenantRegistry::new(config, library));
//! let controller = PlaybackController::new(registry);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod library;
pub mod registry;
pub mod sources;

pub use audio::controller::PlaybackController;
pub use audio::events::{OnComplete, PlayerEvent};
pub use audio::idle::{IdleSettings, IdleWatchdog, WatchdogHandle};
pub use audio::queue::{LoopMode, PlaybackQueue, QueuePage, QueueSnapshot, HISTORY_LIMIT};
pub use audio::sink::AudioSink;
pub use audio::voice_sink::VoiceSink;
pub use config::Config;
pub use error::{PlayerError, ResolveError, SinkError};
pub use library::MediaLibrary;
pub use registry::{GuildSession, TenantRegistry};
pub use sources::tags::{FileTags, LoftyTagReader, TagReader};
pub use sources::ytdlp::YtDlpResolver;
pub use sources::{MediaResolver, SourceKind, Track, TrackMetadata};

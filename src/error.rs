use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the command layer by playback operations.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("queue is full (maximum {0} tracks)")]
    QueueFull(usize),

    #[error("no previous track in history")]
    NoHistory,

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Errors from the external audio sink.
///
/// Variants are stringly-typed on purpose: the sink backend lives outside
/// this crate and its errors only ever get logged or shown to the user.
/// `Clone` lets a completion result travel through the event channel.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("voice connection is not active")]
    NotConnected,

    #[error("failed to start stream: {0}")]
    Start(String),

    #[error("stream ended with error: {0}")]
    Stream(String),
}

/// Errors from resolving a media reference into something playable.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported reference: {0}")]
    Unsupported(String),

    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to fetch media: {0}")]
    Fetch(String),

    #[error("failed to read metadata: {0}")]
    Metadata(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

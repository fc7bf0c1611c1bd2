use async_trait::async_trait;
use std::path::Path;

use super::events::OnComplete;
use crate::error::SinkError;

/// External audio output backend, one per connected guild.
///
/// Contract: every successful `start` fires `on_complete` exactly once,
/// with success on natural end or an error, including when the stream is
/// cut short by `stop`. The notifier may be fired from any thread; it
/// never re-enters the orchestrator directly.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Starts streaming the file at `location`, replacing any active stream.
    async fn start(&self, location: &Path, on_complete: OnComplete) -> Result<(), SinkError>;

    /// Stops the active stream, if any. A no-op when nothing is playing.
    async fn stop(&self) -> Result<(), SinkError>;

    /// Whether a stream is currently playing.
    async fn is_playing(&self) -> bool;

    /// Whether the underlying voice connection is still alive.
    async fn is_connected(&self) -> bool;
}

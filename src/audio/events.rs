//! Completion hand-off between the audio backend and the orchestrator.
//!
//! Sink backends deliver "track finished" from their own driver context.
//! Nothing there may touch guild state: the notifier only posts a
//! [`PlayerEvent`] onto the controller's channel, and the controller's own
//! task does the actual queue mutation.

use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SinkError;

/// Events consumed by the controller's pump task.
#[derive(Debug)]
pub enum PlayerEvent {
    /// A sink stream ended, naturally or with an error. `generation` is
    /// the value stamped when the stream was started; the controller
    /// discards the event if the guild has moved on since.
    TrackFinished {
        guild_id: GuildId,
        generation: u64,
        result: Result<(), SinkError>,
    },
}

pub type EventSender = mpsc::UnboundedSender<PlayerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

enum Completion {
    /// Chained playback: completion re-enters the controller.
    Chained {
        guild_id: GuildId,
        generation: u64,
        tx: EventSender,
    },
    /// Idle filler: completion is dropped on the floor.
    Detached,
}

/// One-shot completion notifier handed to [`AudioSink::start`].
///
/// Fires at most once no matter how many backend events race to report
/// the same stream; later calls are ignored. Clonable so a backend can
/// register it for both its end and error events.
///
/// [`AudioSink::start`]: super::sink::AudioSink::start
#[derive(Clone)]
pub struct OnComplete {
    inner: Arc<Mutex<Option<Completion>>>,
}

impl OnComplete {
    /// Notifier closed over `(guild_id, generation)`, chained back into
    /// the controller through `tx`.
    pub fn chained(guild_id: GuildId, generation: u64, tx: EventSender) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Completion::Chained {
                guild_id,
                generation,
                tx,
            }))),
        }
    }

    /// Notifier that swallows the completion. Used for idle filler, whose
    /// end must never advance the real queue.
    pub fn detached() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Completion::Detached))),
        }
    }

    /// Reports the stream outcome. Safe to call from any thread; only the
    /// first call has an effect.
    pub fn notify(&self, result: Result<(), SinkError>) {
        let Some(completion) = self.inner.lock().take() else {
            return;
        };

        match completion {
            Completion::Chained {
                guild_id,
                generation,
                tx,
            } => {
                let event = PlayerEvent::TrackFinished {
                    guild_id,
                    generation,
                    result,
                };
                if tx.send(event).is_err() {
                    warn!("⚠️ Controller gone, dropping completion for guild {guild_id}");
                }
            }
            Completion::Detached => {
                debug!("🎧 Idle filler finished: {result:?}");
            }
        }
    }
}

impl std::fmt::Debug for OnComplete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let armed = self.inner.lock().is_some();
        f.debug_struct("OnComplete").field("armed", &armed).finish()
    }
}

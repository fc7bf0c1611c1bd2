//! songbird-backed [`AudioSink`].
//!
//! Wraps a voice [`Call`] and the currently active [`TrackHandle`].
//! songbird delivers track events from its driver tasks; the handlers
//! registered here only fire the [`OnComplete`] notifier, which posts the
//! completion onto the controller's channel. No guild state is touched
//! from the driver context.

use async_trait::async_trait;
use parking_lot::Mutex;
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::events::OnComplete;
use super::sink::AudioSink;
use crate::error::SinkError;

pub struct VoiceSink {
    call: Arc<tokio::sync::Mutex<Call>>,
    active: Mutex<Option<TrackHandle>>,
}

impl VoiceSink {
    pub fn new(call: Arc<tokio::sync::Mutex<Call>>) -> Self {
        Self {
            call,
            active: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AudioSink for VoiceSink {
    async fn start(&self, location: &Path, on_complete: OnComplete) -> Result<(), SinkError> {
        let input = songbird::input::File::new(location.to_path_buf());

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input.into())
        };

        // End and Error both resolve the same one-shot notifier; whichever
        // fires first wins.
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    on_complete: on_complete.clone(),
                },
            )
            .map_err(|e| SinkError::Start(format!("failed to register end handler: {e}")))?;
        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorNotifier { on_complete },
            )
            .map_err(|e| SinkError::Start(format!("failed to register error handler: {e}")))?;

        *self.active.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), SinkError> {
        if let Some(handle) = self.active.lock().take() {
            // A handle whose track already ended returns an error here;
            // that is not a failure to stop.
            if let Err(e) = handle.stop() {
                debug!("Stop on finished track: {e}");
            }
        }
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        let handle = self.active.lock().clone();
        let Some(handle) = handle else {
            return false;
        };

        match handle.get_info().await {
            Ok(info) => matches!(info.playing, PlayMode::Play | PlayMode::Pause),
            Err(_) => false,
        }
    }

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }
}

struct TrackEndNotifier {
    on_complete: OnComplete,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.on_complete.notify(Ok(()));
        None
    }
}

struct TrackErrorNotifier {
    on_complete: OnComplete,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let detail = match ctx {
            EventContext::Track(list) => list
                .first()
                .map(|(state, _)| format!("{:?}", state.playing))
                .unwrap_or_else(|| "unknown track error".to_string()),
            _ => "unknown track error".to_string(),
        };

        self.on_complete.notify(Err(SinkError::Stream(detail)));
        None
    }
}

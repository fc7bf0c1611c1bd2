//! Playback state machine.
//!
//! Per guild the controller is a two-state machine, `Idle` or
//! `Playing(generation, track)`, driven by discrete events: play and skip
//! requests from command handlers, stop requests, and `TrackFinished`
//! notifications posted by the sink. Completion-driven advancement never
//! recurses: the sink callback only enqueues an event, and the
//! controller's pump task re-enters [`PlaybackController::play_next`]
//! from its own loop.
//!
//! Every stream start stamps the guild's generation counter into the
//! completion notifier. Skip, stop, previous and leave bump the counter
//! before the old stream is told to stop, so the outgoing stream's
//! completion is guaranteed stale and gets discarded instead of
//! double-advancing the queue.

use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::events::{self, EventReceiver, EventSender, OnComplete, PlayerEvent};
use super::queue::{LoopMode, QueueSnapshot};
use crate::error::PlayerError;
use crate::registry::{GuildSession, TenantRegistry};
use crate::sources::Track;

pub struct PlaybackController {
    registry: Arc<TenantRegistry>,
    events_tx: EventSender,
}

impl PlaybackController {
    /// Creates the controller and spawns its event pump.
    pub fn new(registry: Arc<TenantRegistry>) -> Arc<Self> {
        let (events_tx, events_rx) = events::channel();
        let controller = Arc::new(Self {
            registry,
            events_tx,
        });

        controller.clone().spawn_pump(events_rx);
        controller
    }

    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    fn spawn_pump(self: Arc<Self>, mut events_rx: EventReceiver) {
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                self.dispatch(event).await;
            }
            debug!("Player event channel closed, pump exiting");
        });
    }

    async fn dispatch(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::TrackFinished {
                guild_id,
                generation,
                result,
            } => {
                let Some(session) = self.registry.get(guild_id) else {
                    return;
                };

                // Stale: a skip/stop/new play happened after this stream
                // started. Discard silently.
                if session.generation() != generation {
                    debug!(
                        "Stale completion for guild {guild_id} (gen {generation}, now {})",
                        session.generation()
                    );
                    return;
                }

                // Fail-open: a sink error skips to the next track rather
                // than stalling the guild.
                if let Err(e) = result {
                    warn!("❌ Stream for guild {guild_id} ended with error: {e}");
                }

                if let Err(e) = self.play_next(guild_id).await {
                    error!("Failed to advance queue for guild {guild_id}: {e}");
                }
            }
        }
    }

    /// Appends a track to the guild's queue. No playback side effects.
    pub fn enqueue(&self, guild_id: GuildId, track: Track) -> Result<(), PlayerError> {
        let session = self.registry.session(guild_id);
        let result = session.queue.write().enqueue(track);
        result
    }

    /// Enqueues and starts playback when the guild is idle — the `/play`
    /// flow. Returns the track that started, if any.
    pub async fn play(
        &self,
        guild_id: GuildId,
        track: Track,
    ) -> Result<Option<Track>, PlayerError> {
        self.enqueue(guild_id, track)?;

        let session = self.registry.session(guild_id);
        let Some(sink) = session.sink() else {
            // Not connected yet: queued for later.
            return Ok(None);
        };

        if session.queue.read().current().is_some() || sink.is_playing().await {
            return Ok(None);
        }

        self.play_next(guild_id).await
    }

    /// Advances to the next track: records the current one into history,
    /// applies the loop/shuffle policy, and starts the sink with a fresh
    /// generation. Returns `None` when the queue ran dry.
    pub async fn play_next(&self, guild_id: GuildId) -> Result<Option<Track>, PlayerError> {
        let session = self.registry.session(guild_id);
        let sink = session.sink().ok_or(PlayerError::NotConnected)?;

        let (next, generation) = {
            let mut queue = session.queue.write();

            if let Some(current) = queue.current().cloned() {
                queue.record_played(current);
            }

            match queue.compute_next() {
                None => {
                    queue.clear_current();
                    debug!("Queue drained for guild {guild_id}");
                    return Ok(None);
                }
                Some(next) => {
                    queue.set_current(next.clone());
                    (next, session.bump_generation())
                }
            }
        };

        self.start_stream(&session, sink.as_ref(), &next, generation)
            .await?;

        info!("🎵 Now playing for guild {guild_id}: {}", next.title());
        Ok(Some(next))
    }

    /// Skips the current track. The outgoing stream's completion becomes
    /// stale before the sink is told to stop.
    pub async fn skip(&self, guild_id: GuildId) -> Result<Option<Track>, PlayerError> {
        let session = self.registry.get(guild_id).ok_or(PlayerError::NotConnected)?;
        let sink = session.sink().ok_or(PlayerError::NotConnected)?;

        session.bump_generation();
        sink.stop().await?;
        info!("⏭️ Skip requested for guild {guild_id}");

        self.play_next(guild_id).await
    }

    /// Stops playback and clears `current`. The pending queue survives.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        let session = self.registry.get(guild_id).ok_or(PlayerError::NotConnected)?;
        let sink = session.sink().ok_or(PlayerError::NotConnected)?;

        session.bump_generation();
        sink.stop().await?;
        session.queue.write().clear_current();
        info!("⏹️ Playback stopped for guild {guild_id}");

        Ok(())
    }

    /// Returns to the most recent history entry. The displaced current
    /// track goes back to the front of the queue.
    pub async fn previous(&self, guild_id: GuildId) -> Result<Track, PlayerError> {
        let session = self.registry.get(guild_id).ok_or(PlayerError::NotConnected)?;
        let sink = session.sink().ok_or(PlayerError::NotConnected)?;

        let (prev, generation) = {
            let mut queue = session.queue.write();
            let prev = queue.pop_history().ok_or(PlayerError::NoHistory)?;

            if let Some(current) = queue.take_current() {
                queue.push_front(current);
            }
            queue.set_current(prev.clone());

            (prev, session.bump_generation())
        };

        sink.stop().await?;
        self.start_stream(&session, sink.as_ref(), &prev, generation)
            .await?;

        info!("⏮️ Returning to previous track for guild {guild_id}: {}", prev.title());
        Ok(prev)
    }

    pub fn set_loop_mode(&self, guild_id: GuildId, mode: LoopMode) {
        self.registry
            .session(guild_id)
            .queue
            .write()
            .set_loop_mode(mode);
    }

    pub fn set_shuffle(&self, guild_id: GuildId, enabled: bool) {
        self.registry
            .session(guild_id)
            .queue
            .write()
            .set_shuffle(enabled);
    }

    pub fn set_idle_enabled(&self, guild_id: GuildId, enabled: bool) {
        let session = self.registry.session(guild_id);
        session.set_idle_enabled(enabled);
        if enabled {
            // Restart the inactivity clock so filler doesn't fire at once.
            session.touch_activity();
        }
    }

    /// Read-only queue view for the presentation layer.
    pub fn snapshot(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        self.registry
            .get(guild_id)
            .map(|session| session.queue.read().snapshot())
    }

    async fn start_stream(
        &self,
        session: &Arc<GuildSession>,
        sink: &dyn super::sink::AudioSink,
        track: &Track,
        generation: u64,
    ) -> Result<(), PlayerError> {
        let on_complete =
            OnComplete::chained(session.guild_id(), generation, self.events_tx.clone());

        if let Err(e) = sink.start(track.location(), on_complete).await {
            // Start never happened: leave current unset, report upward.
            session.queue.write().clear_current();
            return Err(e.into());
        }

        session.touch_activity();
        Ok(())
    }
}

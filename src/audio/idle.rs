//! Background filler playback for idle voice connections.
//!
//! One supervised loop per connected guild. After a configurable stretch
//! of silence the watchdog starts a random track from the idle library
//! directly on the sink, bypassing the generation-token protocol: filler
//! never becomes `current`, never enters history, and its completion is
//! never chained into the queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::OnComplete;
use super::sink::AudioSink;
use crate::config::Config;
use crate::library::MediaLibrary;
use crate::registry::GuildSession;

/// Watchdog timing knobs, taken from [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct IdleSettings {
    pub tick: Duration,
    pub threshold: Duration,
    pub backoff: Duration,
}

impl IdleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick: config.idle_tick(),
            threshold: config.idle_threshold(),
            backoff: config.idle_backoff(),
        }
    }
}

/// Handle to a spawned watchdog task.
pub struct WatchdogHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Requests cancellation; observed within one tick.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Per-guild idle loop. Constructed by the registry, runs until the voice
/// connection drops or the handle is cancelled; recoverable tick errors
/// only cause a backoff.
pub struct IdleWatchdog {
    session: Arc<GuildSession>,
    sink: Arc<dyn AudioSink>,
    library: Arc<MediaLibrary>,
    settings: IdleSettings,
}

impl IdleWatchdog {
    pub fn new(
        session: Arc<GuildSession>,
        sink: Arc<dyn AudioSink>,
        library: Arc<MediaLibrary>,
        settings: IdleSettings,
    ) -> Self {
        Self {
            session,
            sink,
            library,
            settings,
        }
    }

    pub fn spawn(self) -> WatchdogHandle {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move { self.run(child).await });

        WatchdogHandle { token, task }
    }

    async fn run(self, token: CancellationToken) {
        let guild_id = self.session.guild_id();
        let mut ticker = tokio::time::interval(self.settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; skip it so
        // a fresh watchdog never races the join that spawned it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Idle watchdog cancelled for guild {guild_id}");
                    break;
                }
                _ = ticker.tick() => {
                    if !self.sink.is_connected().await {
                        info!("🔇 Voice connection gone, idle watchdog for guild {guild_id} terminating");
                        break;
                    }

                    if let Err(e) = self.tick().await {
                        warn!("⚠️ Idle watchdog tick failed for guild {guild_id}: {e}, backing off");
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(self.settings.backoff) => {}
                        }
                    }
                }
            }
        }
    }

    /// One tick of the idle loop.
    async fn tick(&self) -> anyhow::Result<()> {
        if !self.session.idle_enabled() {
            return Ok(());
        }

        if self.sink.is_playing().await {
            self.session.touch_activity();
            return Ok(());
        }

        if self.session.idle_elapsed() < self.settings.threshold {
            return Ok(());
        }

        let Some(filler) = self.library.pick_idle_track()? else {
            debug!("Idle library is empty, nothing to play");
            return Ok(());
        };

        // Outside the generation protocol: detached completion, no queue
        // or history mutation.
        self.sink.start(&filler, OnComplete::detached()).await?;
        info!(
            "🎧 Playing idle track for guild {}: {}",
            self.session.guild_id(),
            filler.display()
        );
        self.session.touch_activity();

        Ok(())
    }
}

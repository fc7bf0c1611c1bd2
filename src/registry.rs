use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serenity::model::id::GuildId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::audio::idle::{IdleSettings, IdleWatchdog, WatchdogHandle};
use crate::audio::queue::PlaybackQueue;
use crate::audio::sink::AudioSink;
use crate::config::Config;
use crate::library::MediaLibrary;

/// Playback state for a single guild.
///
/// Created on first voice join or first enqueue, lives for the process
/// lifetime, never shared between guilds. Everything here is owned by the
/// guild's own task group (its watchdog plus whichever command handler is
/// acting on it); the locks are held for short synchronous sections only,
/// never across an await.
pub struct GuildSession {
    guild_id: GuildId,
    pub(crate) queue: RwLock<PlaybackQueue>,
    generation: AtomicU64,
    last_activity: RwLock<Instant>,
    idle_enabled: AtomicBool,
    sink: RwLock<Option<Arc<dyn AudioSink>>>,
    watchdog: Mutex<Option<WatchdogHandle>>,
}

impl GuildSession {
    fn new(guild_id: GuildId, max_queue_size: usize) -> Self {
        Self {
            guild_id,
            queue: RwLock::new(PlaybackQueue::new(max_queue_size)),
            generation: AtomicU64::new(0),
            last_activity: RwLock::new(Instant::now()),
            // Idle filler defaults to on until the guild opts out.
            idle_enabled: AtomicBool::new(true),
            sink: RwLock::new(None),
            watchdog: Mutex::new(None),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Current generation token. Completion events stamped with an older
    /// value are stale.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Bumps the generation by one and returns the new value. Called on
    /// every playback start, skip and stop.
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn touch_activity(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn idle_elapsed(&self) -> Duration {
        self.last_activity.read().elapsed()
    }

    pub fn idle_enabled(&self) -> bool {
        self.idle_enabled.load(Ordering::Relaxed)
    }

    pub fn set_idle_enabled(&self, enabled: bool) {
        self.idle_enabled.store(enabled, Ordering::Relaxed);
        info!("🎧 Idle mode {} for guild {}", if enabled { "enabled" } else { "disabled" }, self.guild_id);
    }

    pub fn sink(&self) -> Option<Arc<dyn AudioSink>> {
        self.sink.read().clone()
    }

    fn set_sink(&self, sink: Option<Arc<dyn AudioSink>>) {
        *self.sink.write() = sink;
    }

    /// Logical reset on leave: queue, history and current are cleared.
    fn reset(&self) {
        self.queue.write().reset();
    }
}

impl std::fmt::Debug for GuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildSession")
            .field("guild_id", &self.guild_id)
            .field("generation", &self.generation())
            .field("idle_enabled", &self.idle_enabled())
            .finish()
    }
}

/// Per-guild state registry.
///
/// The map itself is the only structure touched by more than one guild's
/// control flow; insert-if-absent goes through `DashMap::entry`, which is
/// atomic. The values are handed out as `Arc`s and owned by each guild's
/// task group from then on.
pub struct TenantRegistry {
    guilds: DashMap<GuildId, Arc<GuildSession>>,
    config: Arc<Config>,
    library: Arc<MediaLibrary>,
}

impl TenantRegistry {
    pub fn new(config: Arc<Config>, library: Arc<MediaLibrary>) -> Self {
        Self {
            guilds: DashMap::new(),
            config,
            library,
        }
    }

    /// Fetches the guild's session, creating it on first use.
    pub fn session(&self, guild_id: GuildId) -> Arc<GuildSession> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Creating playback state for guild {guild_id}");
                Arc::new(GuildSession::new(guild_id, self.config.max_queue_size))
            })
            .clone()
    }

    /// Fetches the guild's session without creating it.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.guilds.get(&guild_id).map(|entry| entry.clone())
    }

    /// Installs the guild's audio sink on voice join.
    pub fn connect(&self, guild_id: GuildId, sink: Arc<dyn AudioSink>) -> Arc<GuildSession> {
        let session = self.session(guild_id);
        session.set_sink(Some(sink));
        session.touch_activity();
        info!("🔌 Voice sink installed for guild {guild_id}");
        session
    }

    /// Starts the guild's idle watchdog. Idempotent: a watchdog that is
    /// still running is never replaced. Returns whether a new task was
    /// spawned.
    pub fn start_watchdog(&self, guild_id: GuildId) -> bool {
        let session = self.session(guild_id);
        let Some(sink) = session.sink() else {
            debug!("No sink installed for guild {guild_id}, watchdog not started");
            return false;
        };

        let mut slot = session.watchdog.lock();
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                debug!("Watchdog already running for guild {guild_id}");
                return false;
            }
        }

        session.touch_activity();
        let watchdog = IdleWatchdog::new(
            session.clone(),
            sink,
            self.library.clone(),
            IdleSettings::from_config(&self.config),
        );
        *slot = Some(watchdog.spawn());
        info!("🐶 Idle watchdog started for guild {guild_id}");
        true
    }

    /// Cancels the guild's watchdog and bumps the generation so any
    /// in-flight stream completion becomes stale.
    pub fn stop_watchdog(&self, guild_id: GuildId) {
        let Some(session) = self.get(guild_id) else {
            return;
        };

        session.bump_generation();
        let handle = session.watchdog.lock().take();
        if let Some(handle) = handle {
            handle.cancel();
            info!("🛑 Idle watchdog stopped for guild {guild_id}");
        }
    }

    /// Tears down the guild's playback state on voice leave: watchdog
    /// cancelled, generation bumped, queue and history cleared, sink
    /// dropped. The session object itself stays registered.
    pub fn leave(&self, guild_id: GuildId) {
        let Some(session) = self.get(guild_id) else {
            return;
        };

        self.stop_watchdog(guild_id);
        session.reset();
        session.set_sink(None);
        info!("👋 Left guild {guild_id}, playback state reset");
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::events::OnComplete;
    use crate::error::SinkError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    struct NullSink {
        starts: AtomicUsize,
    }

    impl NullSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                starts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AudioSink for NullSink {
        async fn start(&self, _location: &Path, _on_complete: OnComplete) -> Result<(), SinkError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<(), SinkError> {
            Ok(())
        }

        async fn is_playing(&self) -> bool {
            false
        }

        async fn is_connected(&self) -> bool {
            true
        }
    }

    fn registry() -> TenantRegistry {
        let config = Arc::new(Config::default());
        let library = Arc::new(MediaLibrary::for_tests());
        TenantRegistry::new(config, library)
    }

    #[test]
    fn session_is_created_once_and_shared() {
        let registry = registry();
        let a = registry.session(GuildId::new(1));
        let b = registry.session(GuildId::new(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sessions_are_isolated_per_guild() {
        let registry = registry();
        let a = registry.session(GuildId::new(1));
        let b = registry.session(GuildId::new(2));
        assert!(!Arc::ptr_eq(&a, &b));

        a.bump_generation();
        assert_eq!(a.generation(), 1);
        assert_eq!(b.generation(), 0);
    }

    #[tokio::test]
    async fn concurrent_session_calls_yield_one_state() {
        let registry = Arc::new(registry());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.session(GuildId::new(9))
            }));
        }

        let sessions: Vec<_> = futures::future::try_join_all(handles).await.unwrap();
        for session in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], session));
        }
    }

    #[tokio::test]
    async fn start_watchdog_is_idempotent() {
        let registry = registry();
        let guild = GuildId::new(3);
        registry.connect(guild, NullSink::new());

        assert!(registry.start_watchdog(guild));
        assert!(!registry.start_watchdog(guild));

        registry.stop_watchdog(guild);
    }

    #[tokio::test]
    async fn watchdog_requires_a_sink() {
        let registry = registry();
        assert!(!registry.start_watchdog(GuildId::new(4)));
    }

    #[tokio::test]
    async fn stop_watchdog_bumps_generation() {
        let registry = registry();
        let guild = GuildId::new(5);
        let session = registry.connect(guild, NullSink::new());
        registry.start_watchdog(guild);

        let before = session.generation();
        registry.stop_watchdog(guild);
        assert_eq!(session.generation(), before + 1);
    }

    #[tokio::test]
    async fn leave_resets_state_and_drops_sink() {
        let registry = registry();
        let guild = GuildId::new(6);
        let session = registry.connect(guild, NullSink::new());
        registry.start_watchdog(guild);

        {
            use crate::sources::{SourceKind, Track};
            use serenity::model::id::UserId;
            let mut queue = session.queue.write();
            queue
                .enqueue(Track::new(
                    "x.mp3".into(),
                    "x".into(),
                    SourceKind::LocalFile,
                    UserId::new(1),
                ))
                .unwrap();
            queue.set_current(Track::new(
                "y.mp3".into(),
                "y".into(),
                SourceKind::LocalFile,
                UserId::new(1),
            ));
        }

        registry.leave(guild);

        assert!(session.sink().is_none());
        let queue = session.queue.read();
        assert!(queue.is_empty());
        assert_eq!(queue.history_len(), 0);
    }
}

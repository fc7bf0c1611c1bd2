use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PlayerError;
use crate::sources::Track;

/// History keeps the 50 most recent tracks; the oldest is evicted first.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Off,
    Single,
    Queue,
}

impl LoopMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Single => "single",
            LoopMode::Queue => "queue",
        }
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LoopMode::Off),
            "single" => Ok(LoopMode::Single),
            "queue" => Ok(LoopMode::Queue),
            other => Err(format!("unknown loop mode: {other}")),
        }
    }
}

/// Ordered per-guild track queue with bounded history.
///
/// Pure data structure: no locking, no I/O. The owning session serializes
/// access; [`PlaybackController`](super::controller::PlaybackController)
/// drives the transitions.
#[derive(Debug)]
pub struct PlaybackQueue {
    pending: VecDeque<Track>,
    current: Option<Track>,
    history: VecDeque<Track>,
    loop_mode: LoopMode,
    shuffle: bool,
    max_size: usize,
}

impl PlaybackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            history: VecDeque::new(),
            loop_mode: LoopMode::Off,
            shuffle: false,
            max_size,
        }
    }

    /// Appends a track to the pending queue.
    pub fn enqueue(&mut self, track: Track) -> Result<(), PlayerError> {
        if self.pending.len() >= self.max_size {
            return Err(PlayerError::QueueFull(self.max_size));
        }

        info!("➕ Queued: {}", track.title());
        self.pending.push_back(track);

        Ok(())
    }

    /// Records a finished track into history, evicting the oldest past the cap.
    pub fn record_played(&mut self, track: Track) {
        self.history.push_back(track);

        if self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Selects the next track under the loop/shuffle policy.
    ///
    /// Order matters:
    /// 1. `Single` loop returns the current track unchanged.
    /// 2. An empty queue under `Queue` loop refills from history, oldest
    ///    first, and clears history.
    /// 3. Still empty means nothing to play.
    /// 4. Shuffle removes one uniformly random element; the rest keep
    ///    their relative order. This is a single draw per call, not a
    ///    permutation of the queue.
    /// 5. Otherwise strict FIFO.
    pub fn compute_next(&mut self) -> Option<Track> {
        if self.loop_mode == LoopMode::Single {
            if let Some(current) = &self.current {
                info!("🔂 Repeating track: {}", current.title());
                return Some(current.clone());
            }
        }

        if self.pending.is_empty() && self.loop_mode == LoopMode::Queue && !self.history.is_empty()
        {
            info!("🔁 Queue loop: refilling {} tracks from history", self.history.len());
            let drained: Vec<Track> = self.history.drain(..).collect();
            self.pending.extend(drained);
        }

        if self.pending.is_empty() {
            debug!("📭 Queue empty, nothing to play");
            return None;
        }

        if self.shuffle {
            let idx = rand::thread_rng().gen_range(0..self.pending.len());
            let selected = self.pending.remove(idx);
            if let Some(track) = &selected {
                info!("🔀 Shuffle pick: {}", track.title());
            }
            selected
        } else {
            let next = self.pending.pop_front();
            if let Some(track) = &next {
                info!("➡️ Next in queue (FIFO): {}", track.title());
            }
            next
        }
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn set_current(&mut self, track: Track) {
        self.current = Some(track);
    }

    pub fn take_current(&mut self) -> Option<Track> {
        self.current.take()
    }

    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Pops the most recent history entry (for `previous`).
    pub fn pop_history(&mut self) -> Option<Track> {
        self.history.pop_back()
    }

    /// Puts a track back at the front of the pending queue.
    pub fn push_front(&mut self, track: Track) {
        self.pending.push_front(track);
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Loop disabled"),
            LoopMode::Single => info!("🔂 Loop single enabled"),
            LoopMode::Queue => info!("🔁 Loop queue enabled"),
        }
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.shuffle = enabled;
        if enabled {
            info!("🔀 Shuffle enabled");
        } else {
            info!("➡️ Shuffle disabled");
        }
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Clears queue, history and current. Used on guild leave.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.history.clear();
        self.current = None;
        info!("🗑️ Queue reset");
    }

    /// Read-only view for the presentation layer.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            pending: self.pending.iter().cloned().collect(),
            loop_mode: self.loop_mode,
            shuffle: self.shuffle,
            total_duration: self.total_duration(),
        }
    }

    fn total_duration(&self) -> Duration {
        let queued: Duration = self.pending.iter().filter_map(|t| t.duration()).sum();
        let current = self
            .current
            .as_ref()
            .and_then(|t| t.duration())
            .unwrap_or_default();

        queued + current
    }
}

/// Snapshot of a guild's queue for display.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub pending: Vec<Track>,
    pub loop_mode: LoopMode,
    pub shuffle: bool,
    pub total_duration: Duration,
}

impl QueueSnapshot {
    /// One page of the pending queue, 1-based.
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let safe_page = page.max(1);
        let start = (safe_page - 1) * items_per_page;
        let end = (start + items_per_page).min(self.pending.len());
        let total_pages = if self.pending.is_empty() {
            1
        } else {
            self.pending.len().div_ceil(items_per_page)
        };

        QueuePage {
            items: if start < self.pending.len() {
                self.pending[start..end].to_vec()
            } else {
                Vec::new()
            },
            current_page: safe_page,
            total_pages,
            total_items: self.pending.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::path::PathBuf;

    fn track(name: &str) -> Track {
        Track::new(
            PathBuf::from(format!("audio_files/{name}.mp3")),
            name.to_string(),
            SourceKind::LocalFile,
            UserId::new(1),
        )
        .with_title(name)
    }

    fn titles(queue: &PlaybackQueue) -> Vec<String> {
        queue
            .snapshot()
            .pending
            .iter()
            .map(|t| t.title().to_string())
            .collect()
    }

    #[test]
    fn fifo_order_with_loop_off() {
        let mut queue = PlaybackQueue::new(10);
        for name in ["a", "b", "c"] {
            queue.enqueue(track(name)).unwrap();
        }

        assert_eq!(queue.compute_next().unwrap().title(), "a");
        assert_eq!(queue.compute_next().unwrap().title(), "b");
        assert_eq!(queue.compute_next().unwrap().title(), "c");
        assert!(queue.compute_next().is_none());
    }

    #[test]
    fn enqueue_rejects_past_max_size() {
        let mut queue = PlaybackQueue::new(2);
        queue.enqueue(track("a")).unwrap();
        queue.enqueue(track("b")).unwrap();
        assert!(matches!(
            queue.enqueue(track("c")),
            Err(PlayerError::QueueFull(2))
        ));
    }

    #[test]
    fn loop_single_repeats_current_indefinitely() {
        let mut queue = PlaybackQueue::new(10);
        queue.enqueue(track("other")).unwrap();
        queue.set_current(track("x"));
        queue.set_loop_mode(LoopMode::Single);

        for _ in 0..5 {
            assert_eq!(queue.compute_next().unwrap().title(), "x");
        }
        // The pending queue is untouched by the short-circuit.
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn loop_queue_drains_history_in_chronological_order() {
        let mut queue = PlaybackQueue::new(10);
        queue.set_loop_mode(LoopMode::Queue);
        for name in ["a", "b", "c"] {
            queue.record_played(track(name));
        }

        assert_eq!(queue.compute_next().unwrap().title(), "a");
        assert_eq!(queue.history_len(), 0);
        assert_eq!(titles(&queue), vec!["b", "c"]);
    }

    #[test]
    fn loop_queue_with_empty_history_yields_none() {
        let mut queue = PlaybackQueue::new(10);
        queue.set_loop_mode(LoopMode::Queue);
        assert!(queue.compute_next().is_none());
    }

    #[test]
    fn history_keeps_only_the_most_recent_50() {
        let mut queue = PlaybackQueue::new(100);
        for i in 0..51 {
            queue.record_played(track(&format!("t{i}")));
        }

        assert_eq!(queue.history_len(), HISTORY_LIMIT);
        // Oldest (t0) evicted; most recent entry is last in.
        assert_eq!(queue.pop_history().unwrap().title(), "t50");
        // Drain the rest; the earliest survivor must be t1.
        let mut earliest = String::new();
        while let Some(t) = queue.pop_history() {
            earliest = t.title().to_string();
        }
        assert_eq!(earliest, "t1");
    }

    #[test]
    fn shuffle_draw_is_roughly_uniform() {
        const N: usize = 5;
        const TRIALS: usize = 2000;
        let mut counts = [0usize; N];

        for _ in 0..TRIALS {
            let mut queue = PlaybackQueue::new(10);
            queue.set_shuffle(true);
            for i in 0..N {
                queue.enqueue(track(&format!("t{i}"))).unwrap();
            }
            let picked = queue.compute_next().unwrap();
            let idx: usize = picked.title()[1..].parse().unwrap();
            counts[idx] += 1;
        }

        // Expect ~400 per item; a 2x band is far beyond noise for 2000 draws.
        for (i, &count) in counts.iter().enumerate() {
            assert!(
                count > TRIALS / N / 2 && count < TRIALS / N * 2,
                "item {i} drawn {count} times out of {TRIALS}"
            );
        }
    }

    #[test]
    fn shuffle_preserves_relative_order_of_the_rest() {
        let mut queue = PlaybackQueue::new(10);
        queue.set_shuffle(true);
        for name in ["a", "b", "c", "d", "e"] {
            queue.enqueue(track(name)).unwrap();
        }

        let picked = queue.compute_next().unwrap().title().to_string();
        let remaining = titles(&queue);
        let expected: Vec<String> = ["a", "b", "c", "d", "e"]
            .iter()
            .filter(|&&n| n != picked)
            .map(|n| n.to_string())
            .collect();

        assert_eq!(remaining, expected);
    }

    #[test]
    fn reset_clears_everything() {
        let mut queue = PlaybackQueue::new(10);
        queue.enqueue(track("a")).unwrap();
        queue.set_current(track("b"));
        queue.record_played(track("c"));

        queue.reset();

        assert!(queue.is_empty());
        assert_eq!(queue.history_len(), 0);
        assert!(queue.current().is_none());
    }

    #[test]
    fn snapshot_pages_the_pending_queue() {
        let mut queue = PlaybackQueue::new(100);
        for i in 0..25 {
            queue.enqueue(track(&format!("t{i}"))).unwrap();
        }

        let snapshot = queue.snapshot();
        let page = snapshot.page(3, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0].title(), "t20");
        assert_eq!(page.total_items, 25);
    }
}

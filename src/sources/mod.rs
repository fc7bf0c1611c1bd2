pub mod tags;
pub mod ytdlp;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ResolveError;

/// Where a track originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A file already on disk (uploads, local library).
    LocalFile,
    /// A remote reference resolved and fetched into the cache.
    RemoteStream,
}

/// Display metadata attached to a track.
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
}

/// A playable track: a resolved on-disk location plus metadata.
#[derive(Debug, Clone)]
pub struct Track {
    location: PathBuf,
    reference: String,
    kind: SourceKind,
    metadata: TrackMetadata,
    requested_by: UserId,
    added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(
        location: PathBuf,
        reference: String,
        kind: SourceKind,
        requested_by: UserId,
    ) -> Self {
        Self {
            location,
            reference,
            kind,
            metadata: TrackMetadata::default(),
            requested_by,
            added_at: Utc::now(),
        }
    }

    // Getters
    pub fn location(&self) -> &Path {
        &self.location
    }
    pub fn reference(&self) -> &str {
        &self.reference
    }
    pub fn kind(&self) -> SourceKind {
        self.kind
    }
    pub fn title(&self) -> &str {
        &self.metadata.title
    }
    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }
    pub fn duration(&self) -> Option<Duration> {
        self.metadata.duration
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    // Setters
    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = title.into();
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.metadata.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.metadata.album = Some(album.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.metadata.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.metadata.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Resolves an external media reference into a playable [`Track`].
///
/// Implementations may take seconds (network fetch); callers await them
/// outside any per-guild lock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, reference: &str, requested_by: UserId) -> Result<Track, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_fills_metadata() {
        let track = Track::new(
            PathBuf::from("audio_files/song.mp3"),
            "song.mp3".to_string(),
            SourceKind::LocalFile,
            UserId::new(7),
        )
        .with_title("A Song")
        .with_artist("Somebody")
        .with_duration(Duration::from_secs(180));

        assert_eq!(track.title(), "A Song");
        assert_eq!(track.metadata().artist.as_deref(), Some("Somebody"));
        assert_eq!(track.duration(), Some(Duration::from_secs(180)));
        assert_eq!(track.kind(), SourceKind::LocalFile);
    }
}

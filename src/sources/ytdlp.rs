//! Remote media resolution through yt-dlp.
//!
//! Fetched audio lands in a disk cache keyed by a content hash of the
//! reference, so repeated plays of the same link reuse the extracted
//! file. Metadata is memoised in-process per reference.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serenity::model::id::UserId;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use super::{MediaResolver, SourceKind, Track, TrackMetadata};
use crate::config::Config;
use crate::error::ResolveError;

/// Metadata subset of `yt-dlp -J` output.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

pub struct YtDlpResolver {
    cache_dir: PathBuf,
    metadata_cache: DashMap<String, TrackMetadata>,
}

impl YtDlpResolver {
    pub fn new(config: &Config) -> Result<Self, ResolveError> {
        Self::with_cache_dir(config.cache_dir.clone())
    }

    pub fn with_cache_dir(cache_dir: PathBuf) -> Result<Self, ResolveError> {
        std::fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            cache_dir,
            metadata_cache: DashMap::new(),
        })
    }

    /// Whether the reference is something this resolver can fetch.
    pub fn is_remote_reference(reference: &str) -> bool {
        matches!(
            Url::parse(reference).map(|url| url.scheme().to_string()),
            Ok(scheme) if scheme == "http" || scheme == "https"
        )
    }

    /// Verifies that yt-dlp is on PATH.
    pub async fn verify_available() -> Result<(), ResolveError> {
        let output = Command::new("yt-dlp")
            .arg("--version")
            .output()
            .await
            .map_err(|e| ResolveError::Fetch(format!("yt-dlp not available: {e}")))?;

        if !output.status.success() {
            return Err(ResolveError::Fetch("yt-dlp not available".to_string()));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!("✅ yt-dlp version: {}", version.trim());
        Ok(())
    }

    /// Cache file for a reference, keyed by a content hash so the same
    /// link always maps to the same file.
    pub fn cache_path(&self, reference: &str) -> PathBuf {
        let digest = Sha256::digest(reference.as_bytes());
        self.cache_dir.join(format!("{}.opus", hex::encode(digest)))
    }

    async fn fetch_metadata(&self, reference: &str) -> Result<TrackMetadata, ResolveError> {
        if let Some(cached) = self.metadata_cache.get(reference) {
            return Ok(cached.clone());
        }

        let output = Command::new("yt-dlp")
            .args(["-J", "--no-playlist", "--no-warnings", reference])
            .output()
            .await
            .map_err(|e| ResolveError::Metadata(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Metadata(stderr.trim().to_string()));
        }

        let info: YtDlpInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| ResolveError::Metadata(format!("bad yt-dlp output: {e}")))?;

        let metadata = TrackMetadata {
            title: info.title.unwrap_or_else(|| "Unknown".to_string()),
            artist: info.uploader,
            album: None,
            duration: info.duration.map(Duration::from_secs_f64),
            thumbnail: info.thumbnail,
        };

        self.metadata_cache
            .insert(reference.to_string(), metadata.clone());
        Ok(metadata)
    }

    async fn fetch_audio(&self, reference: &str, dest: &Path) -> Result<(), ResolveError> {
        if dest.exists() {
            debug!("💾 Cache hit for {reference}");
            return Ok(());
        }

        // yt-dlp substitutes the real extension while extracting; the
        // post-processor leaves the .opus we asked for.
        let template = dest.with_extension("%(ext)s");

        info!("⬇️ Fetching {reference}");
        let output = Command::new("yt-dlp")
            .args([
                "-x",
                "--audio-format",
                "opus",
                "--no-playlist",
                "--no-warnings",
                "-o",
            ])
            .arg(&template)
            .arg(reference)
            .output()
            .await
            .map_err(|e| ResolveError::Fetch(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Fetch(stderr.trim().to_string()));
        }

        if !dest.exists() {
            return Err(ResolveError::NotFound(dest.to_path_buf()));
        }

        Ok(())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, reference: &str, requested_by: UserId) -> Result<Track, ResolveError> {
        if !Self::is_remote_reference(reference) {
            return Err(ResolveError::Unsupported(reference.to_string()));
        }

        let metadata = self.fetch_metadata(reference).await?;
        let location = self.cache_path(reference);
        self.fetch_audio(reference, &location).await?;

        Ok(Track::new(
            location,
            reference.to_string(),
            SourceKind::RemoteStream,
            requested_by,
        )
        .with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver() -> (tempfile::TempDir, YtDlpResolver) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = YtDlpResolver::with_cache_dir(dir.path().join("cache")).unwrap();
        (dir, resolver)
    }

    #[test]
    fn remote_reference_detection() {
        assert!(YtDlpResolver::is_remote_reference(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YtDlpResolver::is_remote_reference("http://example.com/a"));
        assert!(!YtDlpResolver::is_remote_reference("audio_files/song.mp3"));
        assert!(!YtDlpResolver::is_remote_reference("file:///etc/passwd"));
    }

    #[test]
    fn cache_key_is_deterministic_per_reference() {
        let (_dir, resolver) = resolver();
        let a1 = resolver.cache_path("https://example.com/a");
        let a2 = resolver.cache_path("https://example.com/a");
        let b = resolver.cache_path("https://example.com/b");

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        // 32-byte digest, hex-encoded, plus extension.
        assert_eq!(a1.file_name().unwrap().to_str().unwrap().len(), 64 + 5);
    }

    #[tokio::test]
    async fn local_references_are_rejected() {
        let (_dir, resolver) = resolver();
        let result = resolver.resolve("song.mp3", UserId::new(1)).await;
        assert!(matches!(result, Err(ResolveError::Unsupported(_))));
    }

    #[tokio::test]
    async fn cached_audio_is_reused_without_fetching() {
        let (_dir, resolver) = resolver();
        let reference = "https://example.com/cached";
        let cache_file = resolver.cache_path(reference);
        std::fs::write(&cache_file, b"already extracted").unwrap();

        // No process spawned: the file short-circuits the fetch.
        resolver.fetch_audio(reference, &cache_file).await.unwrap();
        assert_eq!(std::fs::read(&cache_file).unwrap(), b"already extracted");
    }
}

use anyhow::Result;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;

/// Audio file extensions the library serves.
const VALID_EXTENSIONS: [&str; 4] = ["mp3", "wav", "ogg", "m4a"];

/// On-disk media library: uploaded audio plus the idle-filler pool.
///
/// The two directories are separate on purpose; idle filler is never
/// mixed into the uploads listing and vice versa.
#[derive(Debug)]
pub struct MediaLibrary {
    audio_dir: PathBuf,
    idle_dir: PathBuf,
}

impl MediaLibrary {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_dirs(config.audio_dir.clone(), config.idle_music_dir.clone())
    }

    pub fn with_dirs(audio_dir: PathBuf, idle_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&audio_dir)?;
        std::fs::create_dir_all(&idle_dir)?;
        info!(
            "📁 Media library at {} (idle pool: {})",
            audio_dir.display(),
            idle_dir.display()
        );

        Ok(Self {
            audio_dir,
            idle_dir,
        })
    }

    pub fn is_valid_audio(filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| VALID_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }

    /// Path for an uploaded file. The filename is reduced to its base
    /// name so callers cannot escape the library directory.
    pub fn audio_path(&self, filename: &str) -> PathBuf {
        let safe_name = Path::new(filename)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        self.audio_dir.join(safe_name)
    }

    pub fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Uploaded audio files, by name.
    pub fn list_audio_files(&self) -> Result<Vec<String>> {
        Self::list_dir(&self.audio_dir)
    }

    /// Idle filler tracks, by name.
    pub fn list_idle_tracks(&self) -> Result<Vec<String>> {
        Self::list_dir(&self.idle_dir)
    }

    /// One uniformly random idle track, or `None` when the pool is empty.
    pub fn pick_idle_track(&self) -> Result<Option<PathBuf>> {
        let tracks = self.list_idle_tracks()?;
        let picked = tracks.choose(&mut rand::thread_rng());
        Ok(picked.map(|name| self.idle_dir.join(name)))
    }

    fn list_dir(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_file() && Self::is_valid_audio(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Throwaway library for unit tests elsewhere in the crate.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        let base = std::env::temp_dir().join("playhead-tests");
        Self::with_dirs(base.join("audio"), base.join("idle")).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn library() -> (tempfile::TempDir, MediaLibrary) {
        let dir = tempfile::tempdir().unwrap();
        let library =
            MediaLibrary::with_dirs(dir.path().join("audio"), dir.path().join("idle")).unwrap();
        (dir, library)
    }

    #[test]
    fn validates_extensions() {
        assert!(MediaLibrary::is_valid_audio("song.mp3"));
        assert!(MediaLibrary::is_valid_audio("SONG.MP3"));
        assert!(MediaLibrary::is_valid_audio("a.ogg"));
        assert!(!MediaLibrary::is_valid_audio("notes.txt"));
        assert!(!MediaLibrary::is_valid_audio("mp3"));
    }

    #[test]
    fn audio_path_strips_directory_components() {
        let (_dir, library) = library();
        let path = library.audio_path("../../etc/passwd.mp3");
        assert_eq!(path, library.audio_dir.join("passwd.mp3"));
    }

    #[test]
    fn listings_filter_non_audio_files() {
        let (_dir, library) = library();
        std::fs::write(library.audio_path("b.mp3"), b"x").unwrap();
        std::fs::write(library.audio_path("a.wav"), b"x").unwrap();
        std::fs::write(library.audio_dir.join("readme.txt"), b"x").unwrap();

        assert_eq!(library.list_audio_files().unwrap(), vec!["a.wav", "b.mp3"]);
    }

    #[test]
    fn pick_from_empty_pool_is_none() {
        let (_dir, library) = library();
        assert!(library.pick_idle_track().unwrap().is_none());
    }

    #[test]
    fn pick_returns_a_pool_member() {
        let (_dir, library) = library();
        for name in ["x.mp3", "y.mp3"] {
            std::fs::write(library.idle_dir.join(name), b"x").unwrap();
        }

        let picked = library.pick_idle_track().unwrap().unwrap();
        let name = picked.file_name().unwrap().to_string_lossy().into_owned();
        assert!(["x.mp3", "y.mp3"].contains(&name.as_str()));
    }
}

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::path::Path;
use tracing::debug;

/// Fallback for every tag field that cannot be read.
const UNKNOWN: &str = "unknown";

/// Best-effort tags for a local audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTags {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl Default for FileTags {
    fn default() -> Self {
        Self {
            title: UNKNOWN.to_string(),
            artist: UNKNOWN.to_string(),
            album: UNKNOWN.to_string(),
        }
    }
}

/// Reads display tags from local files. Never fails: anything that cannot
/// be parsed comes back as `"unknown"`.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> FileTags;
}

/// [`TagReader`] backed by lofty (ID3v1/v2, APE, Vorbis, MP4 and friends).
#[derive(Debug, Default)]
pub struct LoftyTagReader;

impl LoftyTagReader {
    pub fn new() -> Self {
        Self
    }
}

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> FileTags {
        let tagged_file = match Probe::open(path).and_then(|probe| probe.read()) {
            Ok(file) => file,
            Err(e) => {
                debug!("Could not read tags from {}: {e}", path.display());
                return FileTags::default();
            }
        };

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            debug!("No tags found in {}", path.display());
            return FileTags::default();
        };

        FileTags {
            title: tag
                .title()
                .map(|v| v.into_owned())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            artist: tag
                .artist()
                .map(|v| v.into_owned())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            album: tag
                .album()
                .map(|v| v.into_owned())
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

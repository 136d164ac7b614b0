pub mod collection;
pub mod contact_sheet;
pub mod decode;
pub mod error;
pub mod imaging;
pub mod media;
pub mod metadata;
pub mod naming;
pub mod session;
mod slot;

use std::time::Instant;

use serde::{Deserialize, Serialize};

fn default_preview_max_dimension() -> u32 {
    512
}

fn default_thumbnail_max_dimension() -> u32 {
    160
}

fn default_strip_pattern() -> String {
    naming::DEFAULT_STRIP_PATTERN.to_string()
}

fn default_include_hidden() -> bool {
    true
}

/// Collection settings, usually read from a JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionOptions {
    /// Longest side of the fast preview image.
    #[serde(default = "default_preview_max_dimension")]
    pub preview_max_dimension: u32,
    /// Longest side of grid thumbnails.
    #[serde(default = "default_thumbnail_max_dimension")]
    pub thumbnail_max_dimension: u32,
    /// Regex removed from base names to get the editable display name.
    #[serde(default = "default_strip_pattern")]
    pub strip_pattern: String,
    /// Include dot-files when scanning. Excluded ones are counted as skipped.
    #[serde(default = "default_include_hidden")]
    pub include_hidden: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            preview_max_dimension: default_preview_max_dimension(),
            thumbnail_max_dimension: default_thumbnail_max_dimension(),
            strip_pattern: default_strip_pattern(),
            include_hidden: default_include_hidden(),
        }
    }
}

impl CollectionOptions {
    pub fn image_sizes(&self) -> ImageSizes {
        ImageSizes {
            preview_max_dimension: self.preview_max_dimension,
            thumbnail_max_dimension: self.thumbnail_max_dimension,
        }
    }

    pub fn naming_convention(&self) -> Result<NamingConvention> {
        NamingConvention::new(&self.strip_pattern)
    }

    /// Load options from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let options = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(options)
    }
}

pub use collection::{
    CollectionState, FailedRename, MediaCollection, MediaSummary, RenameReport, RenamedItem, ScanReport,
    SortOrder,
};
pub use contact_sheet::ContactSheet;
pub use decode::{ImageDecoder, MediaDecoder, MovieHandle};
pub use error::{Error, Result};
pub use media::{ImageSizes, MediaItem, MediaKind};
pub use metadata::FileMetadata;
pub use naming::NamingConvention;
pub use session::RenameSession;

/// Type alias for progress callback
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter: emits at most every 200ms, or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a (dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a),
    last_emit: std::sync::Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a (dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a)) -> Self {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(1))
            .unwrap_or_else(Instant::now);
        Self {
            inner,
            last_emit: std::sync::Mutex::new(start),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let Ok(mut last) = self.last_emit.lock() else {
                return;
            };
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_options_defaults_from_partial_json() {
        let options: CollectionOptions = serde_json::from_str(r#"{"thumbnail_max_dimension": 96}"#).unwrap();
        assert_eq!(options.thumbnail_max_dimension, 96);
        assert_eq!(options.preview_max_dimension, 512);
        assert_eq!(options.strip_pattern, naming::DEFAULT_STRIP_PATTERN);
        assert!(options.include_hidden);
    }

    #[test]
    fn test_invalid_strip_pattern() {
        let options = CollectionOptions {
            strip_pattern: "[".to_string(),
            ..Default::default()
        };
        assert!(matches!(MediaCollection::new(options), Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_throttled_progress_always_reports_completion() {
        let calls = AtomicU64::new(0);
        let cb = |_: &str, _: u64, _: u64, _: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let tp = ThrottledProgress::new(&cb);
        for i in 0..100 {
            tp.report("load", i, 100, "");
        }
        // First report passes, the burst in between is throttled, the last always passes
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

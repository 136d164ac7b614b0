pub mod exif;

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;

use crate::error::{Error, Result};

/// Metadata read once when an item is created. `None` means unknown, never zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub size: Option<u64>,
    /// EXIF capture time (images only).
    pub captured: Option<NaiveDateTime>,
    /// EXIF orientation code (images only).
    pub orientation: Option<u8>,
}

impl FileMetadata {
    /// Read filesystem metadata, plus EXIF when `with_exif` is set.
    pub fn read(path: &Path, with_exif: bool) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|source| Error::UnreadablePath {
            path: path.to_path_buf(),
            source,
        })?;

        let mut result = Self {
            created: meta.created().ok().map(to_local),
            modified: meta.modified().ok().map(to_local),
            size: Some(meta.len()),
            captured: None,
            orientation: None,
        };

        if with_exif {
            if let Some(summary) = self::exif::read_summary(path) {
                result.captured = summary.captured;
                result.orientation = summary.orientation;
            }
        }

        Ok(result)
    }

    /// Capture date, then creation date, then modification date.
    pub fn best_timestamp(&self) -> Option<NaiveDateTime> {
        self.captured.or(self.created).or(self.modified)
    }
}

fn to_local(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

/// Human readable byte count, e.g. "1.4 MB".
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::media::MediaItem;
use crate::naming::NamingConvention;

/// Current session file format version
const SESSION_VERSION: u32 = 1;

/// Default session filename, stored in the browsed directory
pub const SESSION_FILENAME: &str = ".systematize-session.json";

/// State carried between rename requests in one interaction session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenameSession {
    pub version: u32,
    pub last_used_name: Option<String>,
    pub updated: Option<DateTime<Utc>>,
}

impl Default for RenameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RenameSession {
    pub fn new() -> Self {
        Self {
            version: SESSION_VERSION,
            last_used_name: None,
            updated: None,
        }
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(SESSION_FILENAME)
    }

    /// Load the session stored in `dir`. A missing file or one written by another
    /// format version yields `None`.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(dir);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let session: RenameSession = serde_json::from_reader(BufReader::new(file))?;
        if session.version != SESSION_VERSION {
            debug!("Ignoring session file version {}", session.version);
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Save to `dir`, writing a temp file first and renaming it over the old one.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::path_in(dir);
        let temp_path = dir.join(".systematize-session.tmp");

        let file = File::create(&temp_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    pub fn last_used_name(&self) -> Option<&str> {
        self.last_used_name.as_deref()
    }

    pub fn remember(&mut self, name: &str) {
        self.last_used_name = Some(name.to_string());
        self.updated = Some(Utc::now());
    }

    /// Remember the editable name of `item`, e.g. "beach" for "beach07.jpg".
    pub fn remember_from(&mut self, item: &MediaItem, convention: &NamingConvention) -> String {
        let name = item.effective_display_name(convention);
        self.remember(&name);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::metadata::FileMetadata;
    use tempfile::tempdir;

    #[test]
    fn test_session_save_load() {
        let dir = tempdir().unwrap();
        assert!(RenameSession::load(dir.path()).unwrap().is_none());

        let mut session = RenameSession::new();
        session.remember("vacation");
        session.save(dir.path()).unwrap();

        let loaded = RenameSession::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.last_used_name(), Some("vacation"));
        assert_eq!(loaded, session);
        assert!(!dir.path().join(".systematize-session.tmp").exists());
    }

    #[test]
    fn test_other_version_ignored() {
        let dir = tempdir().unwrap();
        fs::write(
            RenameSession::path_in(dir.path()),
            r#"{"version": 99, "last_used_name": "x", "updated": null}"#,
        )
        .unwrap();
        assert!(RenameSession::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_remember_from_item() {
        let item = MediaItem::with_metadata("/p/beach07.jpg", MediaKind::Image, FileMetadata::default());
        let mut session = RenameSession::new();
        assert_eq!(session.remember_from(&item, &NamingConvention::default()), "beach");
        assert_eq!(session.last_used_name(), Some("beach"));
    }
}

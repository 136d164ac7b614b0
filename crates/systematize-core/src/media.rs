use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::NaiveDateTime;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decode::{ImageDecoder, MediaDecoder, MovieHandle};
use crate::error::{Error, Result};
use crate::imaging;
use crate::metadata::{self, FileMetadata};
use crate::naming::{self, NamingConvention};
use crate::slot::Slot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Movie,
}

impl MediaKind {
    /// Classify a file by extension. `None` for files the collection does not show.
    pub fn from_path(path: &Path) -> Option<Self> {
        let mime = mime_guess::from_path(path).first()?;
        if mime.type_() == mime_guess::mime::IMAGE && image::ImageFormat::from_path(path).is_ok() {
            Some(MediaKind::Image)
        } else if mime.type_() == mime_guess::mime::VIDEO {
            Some(MediaKind::Movie)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Movie => write!(f, "movie"),
        }
    }
}

/// Bounds for the derived rasters of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSizes {
    pub preview_max_dimension: u32,
    pub thumbnail_max_dimension: u32,
}

impl Default for ImageSizes {
    fn default() -> Self {
        Self {
            preview_max_dimension: 512,
            thumbnail_max_dimension: 160,
        }
    }
}

/// One photo or movie on disk.
pub struct MediaItem {
    path: PathBuf,
    name: String,
    pending_name: Option<String>,
    kind: MediaKind,
    metadata: FileMetadata,
    metadata_error: Option<Error>,
    decoder: Arc<dyn MediaDecoder>,
    sizes: ImageSizes,
    convention: NamingConvention,
    full_image: Slot<DynamicImage>,
    preview_image: Slot<DynamicImage>,
    thumbnail: Slot<DynamicImage>,
    movie: Slot<MovieHandle>,
    badge: OnceLock<Arc<DynamicImage>>,
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("pending_name", &self.pending_name)
            .field("kind", &self.kind)
            .field("metadata", &self.metadata)
            .field("loaded", &self.loaded())
            .finish_non_exhaustive()
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl MediaItem {
    /// Build an item and read its metadata using the default decoder.
    pub fn create(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::with_decoder(path, name, Arc::new(ImageDecoder), ImageSizes::default())
    }

    /// Like [`MediaItem::create`], with the name taken from the path.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        Self::create(path, name)
    }

    /// Build an item, reading metadata synchronously. An unreadable path still yields an
    /// item; its metadata is unknown and the failure is kept in [`MediaItem::metadata_error`].
    pub fn with_decoder(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        decoder: Arc<dyn MediaDecoder>,
        sizes: ImageSizes,
    ) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path).unwrap_or(MediaKind::Image);
        let (metadata, metadata_error) = match FileMetadata::read(&path, kind == MediaKind::Image) {
            Ok(metadata) => (metadata, None),
            Err(e) => {
                warn!("{}", e);
                (FileMetadata::default(), Some(e))
            }
        };

        let mut item = Self::with_metadata(path, kind, metadata);
        item.name = name.into();
        item.metadata_error = metadata_error;
        item.decoder = decoder;
        item.sizes = sizes;
        item
    }

    /// Build an item from already known metadata without touching the filesystem.
    pub fn with_metadata(path: impl Into<PathBuf>, kind: MediaKind, metadata: FileMetadata) -> Self {
        let path = path.into();
        Self {
            name: file_name_of(&path),
            path,
            pending_name: None,
            kind,
            metadata,
            metadata_error: None,
            decoder: Arc::new(ImageDecoder),
            sizes: ImageSizes::default(),
            convention: NamingConvention::default(),
            full_image: Slot::new(),
            preview_image: Slot::new(),
            thumbnail: Slot::new(),
            movie: Slot::new(),
            badge: OnceLock::new(),
        }
    }

    // --- type info

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }

    pub fn is_movie(&self) -> bool {
        self.kind == MediaKind::Movie
    }

    /// Placeholder shown while the item has no thumbnail.
    pub fn type_badge(&self) -> Arc<DynamicImage> {
        Arc::clone(self.badge.get_or_init(|| {
            Arc::new(imaging::type_badge(self.kind, self.sizes.thumbnail_max_dimension))
        }))
    }

    // --- loading

    /// True once the payload is decoded: all three rasters for an image, the
    /// playable handle for a movie.
    pub fn loaded(&self) -> bool {
        match self.kind {
            MediaKind::Image => {
                self.full_image.is_ready() && self.preview_image.is_ready() && self.thumbnail.is_ready()
            }
            MediaKind::Movie => self.movie.is_ready(),
        }
    }

    fn decode_failure(&self, reason: String) -> Error {
        Error::DecodeFailure {
            path: self.path.clone(),
            reason,
        }
    }

    fn full_image_or_load(&self) -> std::result::Result<Arc<DynamicImage>, String> {
        self.full_image.get_or_load(|| {
            debug!("Decoding {}", self.path.display());
            let raw = self.decoder.decode_image(&self.path).map_err(Error::into_reason)?;
            Ok(imaging::oriented(&raw, self.metadata.orientation))
        })
    }

    /// Decode the payload if it is not decoded yet. At most one decode runs per item,
    /// even when called from several threads at once.
    pub fn ensure_loaded(&self) -> Result<()> {
        match self.kind {
            MediaKind::Image => {
                let full = self.full_image_or_load().map_err(|r| self.decode_failure(r))?;
                let sizes = self.sizes;
                self.preview_image
                    .get_or_load(|| Ok(imaging::scaled_to_max_dimension(&full, sizes.preview_max_dimension)))
                    .map_err(|r| self.decode_failure(r))?;
                self.thumbnail
                    .get_or_load(|| Ok(imaging::scaled_to_max_dimension(&full, sizes.thumbnail_max_dimension)))
                    .map_err(|r| self.decode_failure(r))?;
            }
            MediaKind::Movie => {
                self.movie
                    .get_or_load(|| self.decoder.open_movie(&self.path).map_err(Error::into_reason))
                    .map_err(|r| self.decode_failure(r))?;
                // Most movies have no still to show; the badge covers them
                if let Err(e) = self.movie_thumbnail() {
                    debug!("{}", e);
                }
            }
        }
        Ok(())
    }

    /// Cheap low-resolution preview, computed once. Uses the camera's embedded
    /// thumbnail when there is one, otherwise scales down the full image.
    pub fn fast_image(&self) -> Result<Arc<DynamicImage>> {
        match self.kind {
            MediaKind::Image => self
                .preview_image
                .get_or_load(|| {
                    if let Some(embedded) = self.decoder.embedded_preview(&self.path) {
                        return Ok(imaging::oriented(&embedded, self.metadata.orientation));
                    }
                    let full = self.full_image_or_load()?;
                    Ok(imaging::scaled_to_max_dimension(&full, self.sizes.preview_max_dimension))
                })
                .map_err(|r| self.decode_failure(r)),
            MediaKind::Movie => self.movie_thumbnail(),
        }
    }

    /// Thumbnail for a movie, derived from its representative frame.
    pub(crate) fn movie_thumbnail(&self) -> Result<Arc<DynamicImage>> {
        self.thumbnail
            .get_or_load(|| {
                let frame = self
                    .decoder
                    .movie_frame(&self.path)
                    .map_err(Error::into_reason)?
                    .ok_or_else(|| "no representative frame".to_string())?;
                Ok(imaging::scaled_to_max_dimension(&frame, self.sizes.thumbnail_max_dimension))
            })
            .map_err(|r| self.decode_failure(r))
    }

    pub(crate) fn thumbnail_settled(&self) -> bool {
        self.thumbnail.is_ready() || self.thumbnail.is_failed()
    }

    // --- image accessors

    /// Full-resolution upright image, once loaded.
    pub fn image(&self) -> Option<Arc<DynamicImage>> {
        self.full_image.get()
    }

    pub fn preview_image(&self) -> Option<Arc<DynamicImage>> {
        self.preview_image.get()
    }

    pub fn thumbnail(&self) -> Option<Arc<DynamicImage>> {
        self.thumbnail.get()
    }

    pub fn movie(&self) -> Option<Arc<MovieHandle>> {
        self.movie.get()
    }

    /// Thumbnail when available, the type badge otherwise.
    pub fn display_image(&self) -> Arc<DynamicImage> {
        self.thumbnail().unwrap_or_else(|| self.type_badge())
    }

    pub fn oriented_image(&self, image: &DynamicImage) -> DynamicImage {
        imaging::oriented(image, self.metadata.orientation)
    }

    pub fn rotate_left(&self, image: &DynamicImage) -> DynamicImage {
        imaging::rotate_left(image)
    }

    pub fn rotate_right(&self, image: &DynamicImage) -> DynamicImage {
        imaging::rotate_right(image)
    }

    // --- names

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// `name` without its extension.
    pub fn base_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(pos) if pos > 0 => &self.name[..pos],
            _ => &self.name,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        match self.name.rfind('.') {
            Some(pos) if pos > 0 && pos + 1 < self.name.len() => Some(&self.name[pos + 1..]),
            _ => None,
        }
    }

    /// Base name with the convention's decoration removed, for editing.
    pub fn effective_display_name(&self, convention: &NamingConvention) -> String {
        convention.strip(self.base_name())
    }

    pub fn pending_name(&self) -> Option<&str> {
        self.pending_name.as_deref()
    }

    pub fn set_pending_name(&mut self, name: Option<String>) {
        self.pending_name = name;
    }

    pub fn naming_convention(&self) -> &NamingConvention {
        &self.convention
    }

    /// Convention used when no pending name is staged. Collections set their own.
    pub fn set_naming_convention(&mut self, convention: NamingConvention) {
        self.convention = convention;
    }

    // --- attributes

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Why metadata is unknown, if reading it failed.
    pub fn metadata_error(&self) -> Option<&Error> {
        self.metadata_error.as_ref()
    }

    pub fn creation_date(&self) -> Option<NaiveDateTime> {
        self.metadata.created
    }

    pub fn modification_date(&self) -> Option<NaiveDateTime> {
        self.metadata.modified
    }

    pub fn file_size(&self) -> Option<u64> {
        self.metadata.size
    }

    pub fn file_size_as_string(&self) -> String {
        match self.metadata.size {
            Some(size) => metadata::format_size(size),
            None => "unknown".to_string(),
        }
    }

    /// The timestamp used for time ordering.
    pub fn date(&self) -> Option<NaiveDateTime> {
        self.metadata.best_timestamp()
    }

    // --- renaming

    /// Destination for a sequential rename: the staged name (or the effective display
    /// name when nothing is staged) followed by `index` zero-padded to `max_count`'s width.
    pub fn rename_target(&self, destination: &Path, index: usize, max_count: usize) -> PathBuf {
        let prefix = match &self.pending_name {
            Some(name) => name.clone(),
            None => self.effective_display_name(&self.convention),
        };
        destination.join(naming::sequential_name(&prefix, index, max_count, self.extension()))
    }

    /// Move the file to its sequential name inside `destination`.
    pub fn commit_rename(&mut self, destination: &Path, index: usize, max_count: usize) -> Result<PathBuf> {
        let target = self.rename_target(destination, index, max_count);

        if target == self.path {
            self.pending_name = None;
            return Ok(target);
        }

        if fs::symlink_metadata(&target).is_ok() && !is_same_file(&self.path, &target) {
            return Err(Error::RenameConflict {
                from: self.path.clone(),
                to: target,
            });
        }

        fs::rename(&self.path, &target).map_err(|source| Error::RenameIo {
            from: self.path.clone(),
            to: target.clone(),
            source,
        })?;

        debug!("Renamed {} -> {}", self.path.display(), target.display());
        self.name = file_name_of(&target);
        self.path = target.clone();
        self.pending_name = None;
        Ok(target)
    }

    // --- sorting

    /// Order by best timestamp; unknown timestamps sort last.
    pub fn compare_by_time(&self, other: &MediaItem) -> Ordering {
        match (self.date(), other.date()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    pub fn compare_by_name(&self, other: &MediaItem) -> Ordering {
        naming::compare_names(self.base_name(), other.base_name())
    }
}

/// Same underlying file, e.g. a case-only rename on a case-insensitive volume.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::decode::{ImageDecoder, MediaDecoder};
use crate::error::{serialize_display, Error, Result};
use crate::media::{ImageSizes, MediaItem, MediaKind};
use crate::naming::{self, NamingConvention};
use crate::{CollectionOptions, ThrottledProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Time,
    Name,
}

/// Where the collection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// No directory scanned and nothing added.
    Empty,
    /// Items are in enumeration or insertion order.
    Scanned,
    Sorted(SortOrder),
    /// Ad hoc order that matches neither sort key.
    Reordered,
}

/// Outcome of a directory scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub directory: PathBuf,
    pub added: usize,
    /// Files skipped because they are not a supported image or movie, or are
    /// hidden while hidden files are excluded.
    pub skipped: usize,
    /// Recovered failures (items kept with unknown metadata).
    pub warnings: Vec<String>,
}

/// One destination computed for a rename, committed or planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamedItem {
    /// 1-based position in the collection order.
    pub position: usize,
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct FailedRename {
    pub position: usize,
    pub path: PathBuf,
    #[serde(serialize_with = "serialize_display")]
    pub error: Error,
}

/// Per-item outcome of a batch rename. Renames are not rolled back on failure.
#[derive(Debug, Default, Serialize)]
pub struct RenameReport {
    pub renamed: Vec<RenamedItem>,
    pub failed: Vec<FailedRename>,
}

impl RenameReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-index view of an item for a presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct MediaSummary {
    pub position: usize,
    pub name: String,
    pub path: PathBuf,
    pub kind: MediaKind,
    pub date: Option<NaiveDateTime>,
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub size: Option<u64>,
    pub size_label: String,
}

/// Ordered set of media items anchored to a source directory.
pub struct MediaCollection {
    root_path: Option<PathBuf>,
    items: Vec<MediaItem>,
    state: CollectionState,
    options: CollectionOptions,
    convention: NamingConvention,
    decoder: Arc<dyn MediaDecoder>,
}

impl Default for MediaCollection {
    fn default() -> Self {
        Self {
            root_path: None,
            items: Vec::new(),
            state: CollectionState::Empty,
            options: CollectionOptions::default(),
            convention: NamingConvention::default(),
            decoder: Arc::new(ImageDecoder),
        }
    }
}

impl MediaCollection {
    pub fn new(options: CollectionOptions) -> Result<Self> {
        Self::with_decoder(options, Arc::new(ImageDecoder))
    }

    pub fn with_decoder(options: CollectionOptions, decoder: Arc<dyn MediaDecoder>) -> Result<Self> {
        let convention = options.naming_convention()?;
        Ok(Self {
            root_path: None,
            items: Vec::new(),
            state: CollectionState::Empty,
            options,
            convention,
            decoder,
        })
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub fn naming_convention(&self) -> &NamingConvention {
        &self.convention
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    pub fn current_directory(&self) -> Option<&Path> {
        self.root_path.as_deref()
    }

    fn image_sizes(&self) -> ImageSizes {
        self.options.image_sizes()
    }

    /// Replace the collection with the supported files directly inside `path`.
    /// Order is filesystem enumeration order until a sort is applied.
    pub fn set_current_directory(&mut self, path: impl AsRef<Path>) -> Result<ScanReport> {
        let requested = path.as_ref();
        let scan_failed = |source| Error::ScanFailed {
            path: requested.to_path_buf(),
            source,
        };
        let root = fs::canonicalize(requested).map_err(scan_failed)?;
        let entries = fs::read_dir(&root).map_err(scan_failed)?;

        self.items.clear();
        self.root_path = Some(root.clone());
        self.state = CollectionState::Scanned;

        let mut report = ScanReport {
            directory: root.clone(),
            ..Default::default()
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                    report.warnings.push(format!("unreadable entry in {}: {}", root.display(), e));
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if MediaKind::from_path(&path).is_none() || (name.starts_with('.') && !self.options.include_hidden) {
                report.skipped += 1;
                continue;
            }

            let mut item = MediaItem::with_decoder(path, name, Arc::clone(&self.decoder), self.image_sizes());
            item.set_naming_convention(self.convention.clone());
            if let Some(e) = item.metadata_error() {
                report.warnings.push(e.to_string());
            }
            self.items.push(item);
            report.added += 1;
        }

        info!(
            "Scanned {}: {} media files, {} skipped",
            root.display(),
            report.added,
            report.skipped
        );
        Ok(report)
    }

    /// Derive thumbnails for movies that do not have one yet. Returns how many were derived.
    pub fn filter_for_movies_with_thumbnail_images(&self) -> usize {
        let derived = self
            .items
            .par_iter()
            .filter(|item| item.is_movie() && !item.thumbnail_settled())
            .filter(|item| match item.movie_thumbnail() {
                Ok(_) => true,
                Err(e) => {
                    debug!("{}", e);
                    false
                }
            })
            .count();
        if derived > 0 {
            info!("Derived {} movie thumbnails", derived);
        }
        derived
    }

    /// Load every item's payload on the rayon pool. Decode failures are returned as warnings.
    pub fn load_all(&self, progress: &(dyn Fn(&str, u64, u64, &str) + Send + Sync + '_)) -> Vec<String> {
        let tp = ThrottledProgress::new(progress);
        let total = self.items.len() as u64;
        let counter = AtomicU64::new(0);

        let mut warnings: Vec<String> = self
            .items
            .par_iter()
            .filter_map(|item| {
                let result = item.ensure_loaded();
                let current = counter.fetch_add(1, Ordering::Relaxed);
                tp.report("load", current, total, item.name());
                result.err().map(|e| {
                    warn!("{}", e);
                    e.to_string()
                })
            })
            .collect();
        warnings.sort();
        warnings
    }

    // --- read access

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }

    fn check_selection(&self, selection: &BTreeSet<usize>) -> Result<()> {
        match selection.last() {
            Some(&index) => self.check_index(index),
            None => Ok(()),
        }
    }

    pub fn object_at_index(&self, index: usize) -> Result<&MediaItem> {
        self.check_index(index)?;
        Ok(&self.items[index])
    }

    pub fn object_at_index_mut(&mut self, index: usize) -> Result<&mut MediaItem> {
        self.check_index(index)?;
        Ok(&mut self.items[index])
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MediaItem> {
        self.items.iter()
    }

    pub fn index_of_path(&self, path: &Path) -> Option<usize> {
        self.items.iter().position(|item| item.path() == path)
    }

    pub fn summaries(&self) -> Vec<MediaSummary> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| MediaSummary {
                position: i + 1,
                name: item.name().to_string(),
                path: item.path().to_path_buf(),
                kind: item.kind(),
                date: item.date(),
                created: item.creation_date(),
                modified: item.modification_date(),
                size: item.file_size(),
                size_label: item.file_size_as_string(),
            })
            .collect()
    }

    // --- mutation

    fn mark_unsorted(&mut self) {
        self.state = match self.state {
            CollectionState::Empty => CollectionState::Scanned,
            CollectionState::Sorted(_) => CollectionState::Reordered,
            other => other,
        };
    }

    fn check_unique(&self, item: &MediaItem) -> Result<()> {
        if self.index_of_path(item.path()).is_some() {
            return Err(Error::DuplicatePath(item.path().to_path_buf()));
        }
        Ok(())
    }

    pub fn add_object(&mut self, mut item: MediaItem) -> Result<()> {
        self.check_unique(&item)?;
        item.set_naming_convention(self.convention.clone());
        self.items.push(item);
        self.mark_unsorted();
        Ok(())
    }

    /// Insert before `index`; `index == size()` appends.
    pub fn insert_object(&mut self, mut item: MediaItem, index: usize) -> Result<()> {
        if index > self.items.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.check_unique(&item)?;
        item.set_naming_convention(self.convention.clone());
        self.items.insert(index, item);
        self.mark_unsorted();
        Ok(())
    }

    fn mark_removed(&mut self) {
        if self.items.is_empty() {
            self.state = CollectionState::Empty;
        }
    }

    pub fn remove_object_at_index(&mut self, index: usize) -> Result<MediaItem> {
        self.check_index(index)?;
        let item = self.items.remove(index);
        self.mark_removed();
        Ok(item)
    }

    /// Remove every selected item, returning them in collection order.
    pub fn remove_objects(&mut self, selection: &BTreeSet<usize>) -> Result<Vec<MediaItem>> {
        self.check_selection(selection)?;
        let mut removed = Vec::with_capacity(selection.len());
        for &index in selection.iter().rev() {
            removed.push(self.items.remove(index));
        }
        removed.reverse();
        self.mark_removed();
        Ok(removed)
    }

    /// Move the selected items, keeping their relative order, so they land before the
    /// item that was at `insertion_index`. Returns the new index of the first moved item.
    pub fn move_objects(&mut self, selection: &BTreeSet<usize>, insertion_index: usize) -> Result<usize> {
        self.check_selection(selection)?;
        if insertion_index > self.items.len() {
            return Err(Error::IndexOutOfRange {
                index: insertion_index,
                len: self.items.len(),
            });
        }

        let mut moved = Vec::with_capacity(selection.len());
        let mut kept = Vec::with_capacity(self.items.len() - selection.len());
        for (i, item) in std::mem::take(&mut self.items).into_iter().enumerate() {
            if selection.contains(&i) {
                moved.push(item);
            } else {
                kept.push(item);
            }
        }

        let at = insertion_index - selection.range(..insertion_index).count();
        kept.splice(at..at, moved);
        self.items = kept;
        if !selection.is_empty() {
            self.state = CollectionState::Reordered;
        }
        Ok(at)
    }

    /// Stable sort by best timestamp.
    pub fn sort_by_time(&mut self) {
        self.items.sort_by(|a, b| a.compare_by_time(b));
        self.state = CollectionState::Sorted(SortOrder::Time);
    }

    /// Stable sort by name.
    pub fn sort_by_name(&mut self) {
        self.items.sort_by(|a, b| a.compare_by_name(b));
        self.state = CollectionState::Sorted(SortOrder::Name);
    }

    pub fn sort(&mut self, order: SortOrder) {
        match order {
            SortOrder::Time => self.sort_by_time(),
            SortOrder::Name => self.sort_by_name(),
        }
    }

    // --- renaming

    fn rename_preflight(&self, base_name: &str, selection: &BTreeSet<usize>) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::EmptyCollectionRename);
        }
        if !naming::is_valid_prefix(base_name) {
            return Err(Error::InvalidName(base_name.to_string()));
        }
        self.check_selection(selection)
    }

    fn rename_destination(&self) -> Result<PathBuf> {
        match &self.root_path {
            Some(root) => Ok(root.clone()),
            None => self
                .items
                .first()
                .and_then(|item| item.path().parent())
                .map(Path::to_path_buf)
                .ok_or(Error::EmptyCollectionRename),
        }
    }

    /// Destinations a rename would use, without touching the disk.
    pub fn plan_rename(&self, base_name: &str, selection: &BTreeSet<usize>) -> Result<Vec<RenamedItem>> {
        self.rename_preflight(base_name, selection)?;
        let destination = self.rename_destination()?;
        let max_count = self.items.len();
        Ok(selection
            .iter()
            .map(|&index| {
                let item = &self.items[index];
                RenamedItem {
                    position: index + 1,
                    from: item.path().to_path_buf(),
                    to: destination.join(naming::sequential_name(
                        base_name,
                        index + 1,
                        max_count,
                        item.extension(),
                    )),
                }
            })
            .collect())
    }

    /// Rename the selected items to `<base_name><position>` in the collection's directory.
    pub fn rename_selection(&mut self, base_name: &str, selection: &BTreeSet<usize>) -> Result<RenameReport> {
        if self.items.is_empty() {
            return Err(Error::EmptyCollectionRename);
        }
        let destination = self.rename_destination()?;
        self.rename_selection_to(base_name, selection, &destination)
    }

    /// Rename the selected items into `destination`. Items are processed in ascending
    /// collection position; a failure does not stop or undo the others.
    pub fn rename_selection_to(
        &mut self,
        base_name: &str,
        selection: &BTreeSet<usize>,
        destination: &Path,
    ) -> Result<RenameReport> {
        self.rename_preflight(base_name, selection)?;

        let max_count = self.items.len();
        let mut report = RenameReport::default();

        for &index in selection {
            let item = &mut self.items[index];
            let from = item.path().to_path_buf();
            item.set_pending_name(Some(base_name.to_string()));

            match item.commit_rename(destination, index + 1, max_count) {
                Ok(to) => {
                    report.renamed.push(RenamedItem {
                        position: index + 1,
                        from,
                        to,
                    });
                }
                Err(error) => {
                    warn!("{}", error);
                    report.failed.push(FailedRename {
                        position: index + 1,
                        path: from,
                        error,
                    });
                }
            }
        }

        info!(
            "Renamed {} of {} selected items to {}*",
            report.renamed.len(),
            selection.len(),
            base_name
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FileMetadata;
    use chrono::NaiveDate;

    fn synthetic(name: &str, day: Option<u32>) -> MediaItem {
        let created = day.map(|d| NaiveDate::from_ymd_opt(2022, 3, d).unwrap().and_hms_opt(10, 0, 0).unwrap());
        MediaItem::with_metadata(
            format!("/album/{}", name),
            MediaKind::Image,
            FileMetadata {
                created,
                ..Default::default()
            },
        )
    }

    fn names(collection: &MediaCollection) -> Vec<&str> {
        collection.iter().map(|item| item.name()).collect()
    }

    #[test]
    fn test_state_transitions() {
        let mut collection = MediaCollection::default();
        assert_eq!(collection.state(), CollectionState::Empty);
        collection.add_object(synthetic("b.jpg", Some(2))).unwrap();
        collection.add_object(synthetic("a.jpg", Some(1))).unwrap();
        assert_eq!(collection.state(), CollectionState::Scanned);
        collection.sort_by_name();
        assert_eq!(collection.state(), CollectionState::Sorted(SortOrder::Name));
        collection.add_object(synthetic("c.jpg", Some(3))).unwrap();
        assert_eq!(collection.state(), CollectionState::Reordered);
    }

    #[test]
    fn test_sort_by_time_is_stable() {
        let mut collection = MediaCollection::default();
        for (name, day) in [("d.jpg", Some(5)), ("a.jpg", None), ("b.jpg", Some(5)), ("c.jpg", Some(1))] {
            collection.add_object(synthetic(name, day)).unwrap();
        }
        collection.sort_by_time();
        assert_eq!(names(&collection), vec!["c.jpg", "d.jpg", "b.jpg", "a.jpg"]);
        collection.sort_by_time();
        assert_eq!(names(&collection), vec!["c.jpg", "d.jpg", "b.jpg", "a.jpg"]);
    }

    #[test]
    fn test_sort_by_name() {
        let mut collection = MediaCollection::default();
        for name in ["img9b.jpg", "img10.jpg", "IMG2.jpg"] {
            collection.add_object(synthetic(name, None)).unwrap();
        }
        collection.sort_by_name();
        assert_eq!(names(&collection), vec!["IMG2.jpg", "img10.jpg", "img9b.jpg"]);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut collection = MediaCollection::default();
        collection.add_object(synthetic("a.jpg", None)).unwrap();
        let err = collection.add_object(synthetic("a.jpg", None)).unwrap_err();
        assert!(matches!(err, Error::DuplicatePath(_)));
        let err = collection.insert_object(synthetic("a.jpg", None), 0).unwrap_err();
        assert!(matches!(err, Error::DuplicatePath(_)));
        assert_eq!(collection.size(), 1);
    }

    #[test]
    fn test_positional_access() {
        let mut collection = MediaCollection::default();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            collection.add_object(synthetic(name, None)).unwrap();
        }
        collection.insert_object(synthetic("z.jpg", None), 1).unwrap();
        assert_eq!(names(&collection), vec!["a.jpg", "z.jpg", "b.jpg", "c.jpg"]);
        assert!(matches!(
            collection.insert_object(synthetic("y.jpg", None), 9),
            Err(Error::IndexOutOfRange { index: 9, len: 4 })
        ));

        let removed = collection.remove_object_at_index(1).unwrap();
        assert_eq!(removed.name(), "z.jpg");
        assert_eq!(collection.object_at_index(1).unwrap().name(), "b.jpg");
        assert!(collection.object_at_index(3).is_err());
        assert!(collection.remove_object_at_index(3).is_err());
    }

    #[test]
    fn test_move_objects() {
        let mut collection = MediaCollection::default();
        for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"] {
            collection.add_object(synthetic(name, None)).unwrap();
        }
        // Drag b and d in front of e
        let first = collection.move_objects(&BTreeSet::from([1, 3]), 4).unwrap();
        assert_eq!(first, 2);
        assert_eq!(names(&collection), vec!["a.jpg", "c.jpg", "b.jpg", "d.jpg", "e.jpg"]);
        assert_eq!(collection.state(), CollectionState::Reordered);

        // Drag e to the front
        assert_eq!(collection.move_objects(&BTreeSet::from([4]), 0).unwrap(), 0);
        assert_eq!(names(&collection), vec!["e.jpg", "a.jpg", "c.jpg", "b.jpg", "d.jpg"]);

        assert!(collection.move_objects(&BTreeSet::from([5]), 0).is_err());
        assert_eq!(collection.size(), 5);
    }

    #[test]
    fn test_remove_objects() {
        let mut collection = MediaCollection::default();
        for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
            collection.add_object(synthetic(name, None)).unwrap();
        }
        let removed = collection.remove_objects(&BTreeSet::from([0, 2])).unwrap();
        let removed: Vec<&str> = removed.iter().map(|item| item.name()).collect();
        assert_eq!(removed, vec!["a.jpg", "c.jpg"]);
        assert_eq!(names(&collection), vec!["b.jpg", "d.jpg"]);
    }

    #[test]
    fn test_removing_last_item_empties_state() {
        let mut collection = MediaCollection::default();
        collection.add_object(synthetic("a.jpg", None)).unwrap();
        collection.add_object(synthetic("b.jpg", None)).unwrap();
        collection.sort_by_name();

        collection.remove_object_at_index(0).unwrap();
        assert_eq!(collection.state(), CollectionState::Sorted(SortOrder::Name));
        collection.remove_object_at_index(0).unwrap();
        assert_eq!(collection.state(), CollectionState::Empty);

        collection.add_object(synthetic("c.jpg", None)).unwrap();
        collection.remove_objects(&BTreeSet::from([0])).unwrap();
        assert_eq!(collection.state(), CollectionState::Empty);
    }

    #[test]
    fn test_items_follow_collection_convention() {
        let options = CollectionOptions {
            strip_pattern: r"-\d+$".to_string(),
            ..Default::default()
        };
        let mut collection = MediaCollection::new(options).unwrap();
        collection.add_object(synthetic("trip-07.jpg", None)).unwrap();
        let target = collection.object_at_index(0).unwrap().rename_target(Path::new("/album"), 2, 5);
        assert_eq!(target, PathBuf::from("/album/trip2.jpg"));
    }

    #[test]
    fn test_empty_rename_rejected() {
        let mut collection = MediaCollection::default();
        let err = collection.rename_selection("x", &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyCollectionRename));
    }

    #[test]
    fn test_plan_rename() {
        let mut collection = MediaCollection::default();
        for i in 0..12 {
            collection.add_object(synthetic(&format!("f{}.jpg", i), None)).unwrap();
        }
        let plan = collection.plan_rename("trip", &BTreeSet::from([0, 11])).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].to, PathBuf::from("/album/trip01.jpg"));
        assert_eq!(plan[1].position, 12);
        assert_eq!(plan[1].to, PathBuf::from("/album/trip12.jpg"));

        assert!(matches!(
            collection.plan_rename("a/b", &BTreeSet::from([0])),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            collection.plan_rename("trip", &BTreeSet::from([12])),
            Err(Error::IndexOutOfRange { index: 12, len: 12 })
        ));
    }
}

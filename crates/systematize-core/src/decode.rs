use std::fs::{self, File};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::debug;

use crate::error::{Error, Result};

/// Extensions of camera-written stills that accompany a movie under the same stem.
const SIDECAR_EXTENSIONS: &[&str] = &["THM", "thm", "JPG", "jpg", "JPEG", "jpeg"];

/// A movie that has been opened and can be handed to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieHandle {
    pub path: PathBuf,
    pub byte_len: u64,
}

/// Decoding capability the model sits on. Implementations must be cheap to share
/// across threads; every method may be called concurrently for different paths.
pub trait MediaDecoder: Send + Sync {
    /// Decode a still image at full resolution.
    fn decode_image(&self, path: &Path) -> Result<DynamicImage>;

    /// Open a movie for playback.
    fn open_movie(&self, path: &Path) -> Result<MovieHandle>;

    /// A representative frame of a movie, or `None` when none is available.
    fn movie_frame(&self, path: &Path) -> Result<Option<DynamicImage>>;

    /// A low-resolution preview that is cheaper than a full decode.
    fn embedded_preview(&self, _path: &Path) -> Option<DynamicImage> {
        None
    }
}

/// Decoder backed by the `image` crate. Movie frames come from sidecar stills.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

fn decode_failure(path: &Path, reason: impl ToString) -> Error {
    Error::DecodeFailure {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// The sidecar still for a movie, if one sits next to it.
pub fn sidecar_still(movie: &Path) -> Option<PathBuf> {
    SIDECAR_EXTENSIONS
        .iter()
        .map(|ext| movie.with_extension(ext))
        .find(|candidate| candidate != movie && candidate.is_file())
}

impl MediaDecoder for ImageDecoder {
    fn decode_image(&self, path: &Path) -> Result<DynamicImage> {
        image::open(path).map_err(|e| decode_failure(path, e))
    }

    fn open_movie(&self, path: &Path) -> Result<MovieHandle> {
        let file = File::open(path).map_err(|e| decode_failure(path, e))?;
        let byte_len = file.metadata().map_err(|e| decode_failure(path, e))?.len();
        if byte_len == 0 {
            return Err(decode_failure(path, "movie file is empty"));
        }
        Ok(MovieHandle {
            path: path.to_path_buf(),
            byte_len,
        })
    }

    fn movie_frame(&self, path: &Path) -> Result<Option<DynamicImage>> {
        let Some(still) = sidecar_still(path) else {
            return Ok(None);
        };
        debug!("Using sidecar {} for {}", still.display(), path.display());
        // THM files are JPEG data behind an unknown extension
        let bytes = fs::read(&still).map_err(|e| decode_failure(&still, e))?;
        let frame = image::load_from_memory(&bytes).map_err(|e| decode_failure(&still, e))?;
        Ok(Some(frame))
    }

    fn embedded_preview(&self, path: &Path) -> Option<DynamicImage> {
        let bytes = crate::metadata::exif::embedded_thumbnail(path)?;
        image::load_from_memory(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};
    use std::io::Write;

    #[test]
    fn test_decode_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::new(6, 3).save(&path).unwrap();
        let img = ImageDecoder.decode_image(&path).unwrap();
        assert_eq!(img.dimensions(), (6, 3));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        File::create(&path).unwrap().write_all(b"not a jpeg").unwrap();
        let err = ImageDecoder.decode_image(&path).unwrap_err();
        assert!(matches!(err, Error::DecodeFailure { .. }));
    }

    #[test]
    fn test_open_movie() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mov");
        File::create(&path).unwrap().write_all(b"moov").unwrap();
        let handle = ImageDecoder.open_movie(&path).unwrap();
        assert_eq!(handle.byte_len, 4);

        let empty = dir.path().join("empty.mov");
        File::create(&empty).unwrap();
        assert!(ImageDecoder.open_movie(&empty).is_err());
    }

    #[test]
    fn test_movie_frame_from_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let movie = dir.path().join("MVI_0042.AVI");
        File::create(&movie).unwrap().write_all(b"RIFF").unwrap();
        assert!(ImageDecoder.movie_frame(&movie).unwrap().is_none());

        // Camera sidecars are JPEG data with a .THM extension
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(16, 12))
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();
        fs::write(dir.path().join("MVI_0042.THM"), &jpeg).unwrap();

        let frame = ImageDecoder.movie_frame(&movie).unwrap().unwrap();
        assert_eq!(frame.dimensions(), (16, 12));
    }
}

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag};
use tracing::trace;

/// The parts of an image's EXIF block the collection cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifSummary {
    /// Capture time, local time as recorded by the camera.
    pub captured: Option<NaiveDateTime>,
    /// EXIF orientation code (1..=8).
    pub orientation: Option<u8>,
}

fn read_exif(path: &Path) -> Option<Exif> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Some(exif),
        Err(e) => {
            trace!("No EXIF data for {}: {}", path.display(), e);
            None
        }
    }
}

/// Read capture date and orientation from an image file's EXIF block.
pub fn read_summary(path: &Path) -> Option<ExifSummary> {
    let exif = read_exif(path)?;
    Some(ExifSummary {
        captured: capture_date(&exif),
        orientation: orientation(&exif),
    })
}

fn capture_date(exif: &Exif) -> Option<NaiveDateTime> {
    let tags = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

    for tag in &tags {
        if let Some(field) = exif.get_field(*tag, In::PRIMARY) {
            let val = field.display_value().to_string();
            if let Some(dt) = parse_exif_datetime(&val) {
                return Some(dt);
            }
        }
    }

    None
}

fn orientation(exif: &Exif) -> Option<u8> {
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    match field.value.get_uint(0) {
        Some(v @ 1..=8) => Some(v as u8),
        _ => None,
    }
}

/// Bytes of the JPEG thumbnail the camera embedded in the EXIF block, if any.
pub fn embedded_thumbnail(path: &Path) -> Option<Vec<u8>> {
    let exif = read_exif(path)?;
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let len = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let buf = exif.buf();
    let end = offset.checked_add(len)?;
    if len == 0 || end > buf.len() {
        return None;
    }
    Some(buf[offset..end].to_vec())
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .trim()
        .replace('-', ":")
        .replace('/', ":")
        .replace('\\', ":")
        .replace('.', ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }

    if let Ok(d) = chrono::NaiveDate::parse_from_str(cleaned.split(' ').next()?, "%Y:%m:%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_exif_datetime_variants() {
        let expected = NaiveDate::from_ymd_opt(2008, 7, 14)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap();
        assert_eq!(parse_exif_datetime("2008:07:14 09:30:05"), Some(expected));
        assert_eq!(parse_exif_datetime("2008-07-14 09:30:05"), Some(expected));
        assert_eq!(
            parse_exif_datetime("2008/07/14"),
            NaiveDate::from_ymd_opt(2008, 7, 14).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_exif_datetime("not a date"), None);
    }

    #[test]
    fn test_missing_exif_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();
        assert!(read_summary(&path).is_none());
        assert!(embedded_thumbnail(&path).is_none());
    }
}

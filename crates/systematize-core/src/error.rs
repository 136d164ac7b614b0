use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem metadata could not be read. The item is still usable with unknown metadata.
    #[error("cannot read metadata for {}: {source}", path.display())]
    UnreadablePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Payload could not be decoded. The item stays unloaded and shows its type badge.
    #[error("cannot decode {}: {reason}", path.display())]
    DecodeFailure { path: PathBuf, reason: String },

    #[error("cannot rename {} to {}: destination already exists", from.display(), to.display())]
    RenameConflict { from: PathBuf, to: PathBuf },

    #[error("cannot rename {} to {}: {source}", from.display(), to.display())]
    RenameIo {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index {index} out of range for collection of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{} is already in the collection", .0.display())]
    DuplicatePath(PathBuf),

    #[error("nothing to rename: the collection is empty")]
    EmptyCollectionRename,

    #[error("invalid rename base name {0:?}")]
    InvalidName(String),

    #[error("cannot scan directory {}: {source}", path.display())]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid naming pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The bare failure description, without the path prefix a decode failure carries.
    pub(crate) fn into_reason(self) -> String {
        match self {
            Error::DecodeFailure { reason, .. } => reason,
            other => other.to_string(),
        }
    }
}

pub(crate) fn serialize_display<T, S>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: serde::Serializer,
{
    serializer.collect_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reason_strips_path() {
        let err = Error::DecodeFailure {
            path: PathBuf::from("/photos/a.jpg"),
            reason: "truncated".to_string(),
        };
        assert_eq!(err.to_string(), "cannot decode /photos/a.jpg: truncated");
        assert_eq!(err.into_reason(), "truncated");
    }

    #[test]
    fn test_index_message() {
        let err = Error::IndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "index 4 out of range for collection of 2 items");
    }
}

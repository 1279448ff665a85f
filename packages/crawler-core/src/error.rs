use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from the persistence layer.
///
/// Malformed persisted data is deliberately NOT represented here: a corrupt
/// document reads back as absent and a corrupt queue line is dropped on
/// load. Only failures the caller must act on (i.e. writes) propagate.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

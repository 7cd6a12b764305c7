use std::path::PathBuf;

use reqwest::StatusCode;

/// Failure kinds a pipeline stage can report.
///
/// None of these abort a batch: the driver logs them and moves on to the next
/// page or stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("no table found on {url}")]
    NoTable { url: String },

    #[error("table on {url} has no data cells")]
    EmptyTable { url: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl StageError {
    /// Per-page failures: the page is skipped and counted, the batch goes on.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            StageError::Request { .. }
                | StageError::Status { .. }
                | StageError::NoTable { .. }
                | StageError::EmptyTable { .. }
        )
    }
}

/// Map `NotFound` on an input file to `MissingFile`, keep other IO errors as-is.
pub fn open_input(path: &std::path::Path) -> Result<std::fs::File, StageError> {
    std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StageError::MissingFile(path.to_path_buf()),
        _ => StageError::Io(e),
    })
}

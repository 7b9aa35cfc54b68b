pub mod error;
pub mod model;

pub use error::{AppError, DownloadError};
pub use model::{DownloadPhase, DownloadState};

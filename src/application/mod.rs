pub mod download_coordinator;
pub mod frame_decoder;
pub mod progress_reducer;

pub use download_coordinator::{
    validate_request, ChannelSink, DownloadSessionController, SessionOutcome, SessionUpdate,
};

use crate::{
    api::{EventRecord, EventStatus},
    domain::{DownloadError, DownloadPhase, DownloadState},
};

/// What the session controller must do after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Redraw the progress bar and label.
    Repaint,
    /// Show the completed state, then after the completion delay reset to
    /// `Idle`, clear the form and refresh the model list.
    ScheduleReset,
    /// Switch the progress panel to its failure styling.
    ShowFailure,
    /// Nothing changed (record arrived after a terminal state).
    Ignore,
}

pub fn clamp_percent(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}

/// Fold one record into the session state.
pub fn reduce(state: &DownloadState, record: &EventRecord) -> (DownloadState, Effect) {
    if state.phase.is_terminal() {
        return (state.clone(), Effect::Ignore);
    }

    match record.status {
        EventStatus::Starting | EventStatus::Downloading => (
            DownloadState {
                phase: DownloadPhase::InProgress,
                percent: clamp_percent(record.progress),
                file_label: file_label(record),
                error_message: None,
            },
            Effect::Repaint,
        ),
        EventStatus::Completed => (
            DownloadState {
                phase: DownloadPhase::Completed,
                percent: clamp_percent(record.progress),
                file_label: String::new(),
                error_message: None,
            },
            Effect::ScheduleReset,
        ),
        EventStatus::Error => fail(state, &reported_error(record)),
    }
}

/// The server's own failure text, or a generic one when it sent none.
fn reported_error(record: &EventRecord) -> DownloadError {
    let message = record
        .error
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or("download failed");
    DownloadError::ServerReported(message.to_string())
}

/// The body ended. Anything short of a terminal record is a failure.
pub fn end_of_stream(state: &DownloadState) -> (DownloadState, Effect) {
    fail(state, &DownloadError::PrematureEndOfStream)
}

/// Move a live session to `Failed`, keeping its last progress and label.
pub fn fail(state: &DownloadState, error: &DownloadError) -> (DownloadState, Effect) {
    if state.phase.is_terminal() {
        return (state.clone(), Effect::Ignore);
    }

    (
        DownloadState {
            phase: DownloadPhase::Failed,
            error_message: Some(error.to_string()),
            ..state.clone()
        },
        Effect::ShowFailure,
    )
}

pub fn reset() -> DownloadState {
    DownloadState::default()
}

fn file_label(record: &EventRecord) -> String {
    let file = record.current_file.clone().unwrap_or_default();
    if record.total_files == 0 {
        return file;
    }

    let counter = format!("{}/{} files", record.downloaded_files, record.total_files);
    if file.is_empty() {
        counter
    } else {
        format!("{} ({})", file, counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: EventStatus, progress: i64) -> EventRecord {
        EventRecord {
            status,
            progress,
            current_file: None,
            error: None,
            total_files: 0,
            downloaded_files: 0,
        }
    }

    fn downloading(progress: i64, file: &str) -> EventRecord {
        EventRecord {
            current_file: Some(file.to_string()),
            ..record(EventStatus::Downloading, progress)
        }
    }

    #[test]
    fn test_downloading_updates_progress() {
        let (state, effect) = reduce(&DownloadState::default(), &downloading(10, "a.bin"));
        assert_eq!(effect, Effect::Repaint);
        assert_eq!(state.phase, DownloadPhase::InProgress);
        assert_eq!(state.percent, 10);
        assert_eq!(state.file_label, "a.bin");
    }

    #[test]
    fn test_progress_is_clamped() {
        for (raw, expected) in [(-5, 0), (0, 0), (55, 55), (100, 100), (250, 100)] {
            let (state, _) = reduce(&DownloadState::default(), &downloading(raw, "a.bin"));
            assert_eq!(state.percent, expected, "progress {raw}");
            assert_eq!(state.phase, DownloadPhase::InProgress);
        }
    }

    #[test]
    fn test_progress_regression_is_applied() {
        let (state, _) = reduce(&DownloadState::default(), &downloading(60, "a.bin"));
        let (state, effect) = reduce(&state, &downloading(30, "b.bin"));
        assert_eq!(effect, Effect::Repaint);
        assert_eq!(state.percent, 30);
        assert_eq!(state.file_label, "b.bin");
    }

    #[test]
    fn test_file_counter_in_label() {
        let rec = EventRecord {
            total_files: 4,
            downloaded_files: 1,
            ..downloading(25, "model.safetensors")
        };
        let (state, _) = reduce(&DownloadState::default(), &rec);
        assert_eq!(state.file_label, "model.safetensors (1/4 files)");
    }

    #[test]
    fn test_completed_clears_label() {
        let (state, _) = reduce(&DownloadState::default(), &downloading(90, "a.bin"));
        let (state, effect) = reduce(&state, &record(EventStatus::Completed, 100));
        assert_eq!(effect, Effect::ScheduleReset);
        assert_eq!(state.phase, DownloadPhase::Completed);
        assert_eq!(state.percent, 100);
        assert!(state.file_label.is_empty());
    }

    #[test]
    fn test_error_before_any_progress() {
        let rec = EventRecord {
            error: Some("disk full".to_string()),
            ..record(EventStatus::Error, 0)
        };
        let (state, effect) = reduce(&DownloadState::default(), &rec);
        assert_eq!(effect, Effect::ShowFailure);
        assert_eq!(state.phase, DownloadPhase::Failed);
        assert_eq!(state.error_message.as_deref(), Some("disk full"));
        assert!(state.file_label.is_empty());
    }

    #[test]
    fn test_error_without_message() {
        let (state, _) = reduce(&DownloadState::default(), &record(EventStatus::Error, 0));
        assert_eq!(state.error_message.as_deref(), Some("download failed"));
    }

    #[test]
    fn test_error_record_is_server_reported() {
        let empty = EventRecord {
            error: Some(String::new()),
            ..record(EventStatus::Error, 0)
        };
        for rec in [record(EventStatus::Error, 0), empty] {
            assert_eq!(
                reported_error(&rec),
                DownloadError::ServerReported("download failed".to_string())
            );
        }

        let rec = EventRecord {
            error: Some("disk full".to_string()),
            ..record(EventStatus::Error, 0)
        };
        assert_eq!(
            reported_error(&rec),
            DownloadError::ServerReported("disk full".to_string())
        );
    }

    #[test]
    fn test_records_after_terminal_are_ignored() {
        let (done, _) = reduce(&DownloadState::default(), &record(EventStatus::Completed, 100));
        let (after, effect) = reduce(&done, &downloading(10, "a.bin"));
        assert_eq!(effect, Effect::Ignore);
        assert_eq!(after, done);

        let (failed, _) = end_of_stream(&DownloadState::default());
        let (after, effect) = reduce(&failed, &record(EventStatus::Completed, 100));
        assert_eq!(effect, Effect::Ignore);
        assert_eq!(after, failed);
    }

    #[test]
    fn test_end_of_stream_without_terminal_record() {
        let (state, _) = reduce(&DownloadState::default(), &downloading(40, "a.bin"));
        let (state, effect) = end_of_stream(&state);
        assert_eq!(effect, Effect::ShowFailure);
        assert_eq!(state.phase, DownloadPhase::Failed);
        assert_eq!(state.percent, 40);
        assert_eq!(state.error_message.as_deref(), Some("download failed"));
    }

    #[test]
    fn test_end_of_stream_after_completion_is_ignored() {
        let (done, _) = reduce(&DownloadState::default(), &record(EventStatus::Completed, 100));
        assert_eq!(end_of_stream(&done), (done.clone(), Effect::Ignore));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadPhase {
    #[default]
    Idle,
    InProgress,
    Completed,
    Failed,
}

impl DownloadPhase {
    /// Completed and Failed sessions accept no further records.
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadPhase::Completed | DownloadPhase::Failed)
    }
}

/// What the progress panel shows for one download session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadState {
    pub phase: DownloadPhase,
    pub percent: u8,
    pub file_label: String,
    pub error_message: Option<String>,
}

impl DownloadState {
    pub fn is_visible(&self) -> bool {
        self.phase != DownloadPhase::Idle
    }

    pub fn status_text(&self) -> String {
        match self.phase {
            DownloadPhase::Idle => String::new(),
            DownloadPhase::InProgress => "Downloading...".to_string(),
            DownloadPhase::Completed => "Download completed!".to_string(),
            DownloadPhase::Failed => format!(
                "Error: {}",
                self.error_message.as_deref().unwrap_or("download failed")
            ),
        }
    }
}

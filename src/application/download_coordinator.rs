use std::{pin::pin, time::Duration};

use futures::{channel::mpsc, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    frame_decoder::frames,
    progress_reducer::{self, Effect},
};
use crate::{
    api::{ApiClient, ApiError, DownloadRequest},
    domain::{AppError, DownloadError, DownloadState},
    utils::is_valid_repo_id,
};

/// Where a session's visible effects go.
pub trait ProgressSink: Send {
    fn render(&mut self, state: &DownloadState);
    fn reset_form(&mut self);
    fn refresh_models(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed(String),
    /// Superseded by a newer session; nothing was shown after cancellation.
    Cancelled,
}

/// Sink calls forwarded as messages, tagged with the session they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Render(DownloadState),
    ResetForm,
    RefreshModels,
}

/// Forwards sink calls over a channel so a UI loop can apply them.
pub struct ChannelSink {
    session: u64,
    tx: mpsc::UnboundedSender<(u64, SessionUpdate)>,
}

impl ChannelSink {
    pub fn new(session: u64) -> (Self, mpsc::UnboundedReceiver<(u64, SessionUpdate)>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { session, tx }, rx)
    }

    fn send(&self, update: SessionUpdate) {
        // The receiver is gone once the UI stops listening; nothing to do then.
        let _ = self.tx.unbounded_send((self.session, update));
    }
}

impl ProgressSink for ChannelSink {
    fn render(&mut self, state: &DownloadState) {
        self.send(SessionUpdate::Render(state.clone()));
    }

    fn reset_form(&mut self) {
        self.send(SessionUpdate::ResetForm);
    }

    fn refresh_models(&mut self) {
        self.send(SessionUpdate::RefreshModels);
    }
}

/// Check a download form submission before any request goes out.
pub fn validate_request(request: &DownloadRequest) -> Result<(), AppError> {
    if request.model_name.trim().is_empty() {
        return Err(AppError::InvalidInput("model name is required".to_string()));
    }
    if !is_valid_repo_id(&request.hf_model_id) {
        return Err(AppError::InvalidInput(format!(
            "`{}` is not a Hugging Face repo id",
            request.hf_model_id
        )));
    }
    Ok(())
}

/// Runs one download from request to final UI effect.
///
/// A controller is consumed by [`run`](Self::run) or [`drive`](Self::drive);
/// every new submission gets a fresh one.
pub struct DownloadSessionController<S> {
    api_client: ApiClient,
    sink: S,
    state: DownloadState,
    completion_delay: Duration,
    cancel: CancellationToken,
}

impl<S: ProgressSink> DownloadSessionController<S> {
    pub fn new(api_client: ApiClient, sink: S) -> Self {
        let completion_delay = api_client.config().completion_delay;
        Self {
            api_client,
            sink,
            state: DownloadState::default(),
            completion_delay,
            cancel: CancellationToken::new(),
        }
    }

    #[cfg(test)]
    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[cfg(test)]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start the download on the backend and follow its progress stream.
    pub async fn run(mut self, request: DownloadRequest) -> SessionOutcome {
        info!(
            model = %request.model_name,
            source = %request.hf_model_id,
            "starting model download"
        );
        self.state = progress_reducer::reset();
        self.sink.render(&self.state);

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            response = self.api_client.start_download(&request) => Some(response),
        };

        match response {
            None => self.cancelled(),
            Some(Ok(bytes)) => self.drive(bytes).await,
            Some(Err(e)) => {
                warn!(error = %e, "download request failed");
                self.apply_failure(&DownloadError::transport(e))
            }
        }
    }

    /// Consume an already-open progress stream.
    pub async fn drive<B>(mut self, bytes: B) -> SessionOutcome
    where
        B: Stream<Item = Result<bytes::Bytes, ApiError>> + Send + 'static,
    {
        let mut records = pin!(frames(bytes));

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                item = records.next() => Some(item),
            };
            let Some(item) = next else {
                return self.cancelled();
            };

            let (state, effect) = match item {
                Some(Ok(record)) => {
                    debug!(
                        status = ?record.status,
                        progress = record.progress,
                        file = record.current_file.as_deref().unwrap_or(""),
                        "download progress"
                    );
                    progress_reducer::reduce(&self.state, &record)
                }
                Some(Err(error)) => {
                    warn!(%error, "progress stream aborted");
                    progress_reducer::fail(&self.state, &error)
                }
                None => {
                    warn!("progress stream closed without a final status");
                    progress_reducer::end_of_stream(&self.state)
                }
            };
            self.state = state;

            match effect {
                Effect::Repaint => self.sink.render(&self.state),
                Effect::Ignore => {}
                Effect::ShowFailure => {
                    self.sink.render(&self.state);
                    return self.failed_outcome();
                }
                Effect::ScheduleReset => {
                    self.sink.render(&self.state);
                    return self.complete().await;
                }
            }
        }
    }

    async fn complete(mut self) -> SessionOutcome {
        info!("model download completed");

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled(),
            _ = tokio::time::sleep(self.completion_delay) => {}
        }

        self.state = progress_reducer::reset();
        self.sink.render(&self.state);
        self.sink.reset_form();
        self.sink.refresh_models();
        SessionOutcome::Completed
    }

    fn apply_failure(mut self, error: &DownloadError) -> SessionOutcome {
        let (state, effect) = progress_reducer::fail(&self.state, error);
        self.state = state;
        if effect == Effect::ShowFailure {
            self.sink.render(&self.state);
        }
        self.failed_outcome()
    }

    fn failed_outcome(&self) -> SessionOutcome {
        let message = self
            .state
            .error_message
            .clone()
            .unwrap_or_else(|| DownloadError::PrematureEndOfStream.to_string());
        warn!(error = %message, "model download failed");
        SessionOutcome::Failed(message)
    }

    fn cancelled(&self) -> SessionOutcome {
        info!("download session superseded");
        SessionOutcome::Cancelled
    }
}

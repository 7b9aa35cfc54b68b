use std::time::Duration;

use futures::StreamExt;
use iced::{Subscription, Task};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiConfig, ApiError, DownloadRequest, ModelSummary, SystemInfo};
use crate::application::{
    validate_request, ChannelSink, DownloadSessionController, SessionOutcome, SessionUpdate,
};
use crate::ui::{DashboardMessage, DashboardView, Toast, ToastKind};

const TOAST_LIFETIME: Duration = Duration::from_secs(5);

pub struct DashboardApp {
    view: DashboardView,
    api_client: ApiClient,
    /// Id of the session whose updates reach the progress panel.
    current_session: u64,
    session_cancel: Option<CancellationToken>,
    next_toast: u64,
}

impl Default for DashboardApp {
    fn default() -> Self {
        Self::new(ApiConfig::default())
    }
}

impl DashboardApp {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            view: DashboardView::default(),
            api_client: ApiClient::new(config),
            current_session: 0,
            session_cancel: None,
            next_toast: 0,
        }
    }

    /// Application state plus the initial models/system fetch.
    pub fn boot(config: ApiConfig) -> (Self, Task<Message>) {
        let app = Self::new(config);
        let task = refresh_all(&app);
        (app, task)
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DashboardMessage),
    /// Periodic refresh of models and system info
    Tick,
    ModelsLoaded(Result<Vec<ModelSummary>, String>),
    SystemLoaded(Result<SystemInfo, String>),
    /// (Session id, sink call)
    Session(u64, SessionUpdate),
    SessionFinished(u64, SessionOutcome),
    /// (Model name, operator confirmed)
    DeleteConfirmed(String, bool),
    /// Load/unload/delete result, as toast text
    LifecycleDone(Result<String, String>),
    Generated(Result<String, String>),
    ToastExpired(u64),
}

pub fn update(app: &mut DashboardApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DashboardMessage::DownloadPressed => return start_download(app),
                DashboardMessage::RefreshPressed => return refresh_all(app),
                DashboardMessage::LoadPressed(name) => {
                    let client = app.api_client.clone();
                    return lifecycle_task(async move {
                        client
                            .load_model(&name)
                            .await
                            .map(|_| "Model loaded successfully".to_string())
                            .map_err(|e| failure_text("Failed to load model", e))
                    });
                }
                DashboardMessage::UnloadPressed(name) => {
                    let client = app.api_client.clone();
                    return lifecycle_task(async move {
                        client
                            .unload_model(&name)
                            .await
                            .map(|_| "Model unloaded successfully".to_string())
                            .map_err(|e| failure_text("Failed to unload model", e))
                    });
                }
                DashboardMessage::DeletePressed(name) => {
                    return Task::perform(confirm_delete(name.clone()), move |confirmed| {
                        Message::DeleteConfirmed(name.clone(), confirmed)
                    });
                }
                DashboardMessage::GeneratePressed => return start_generation(app),
                _ => {}
            }
        }
        Message::Tick => return refresh_all(app),
        Message::ModelsLoaded(result) => match result {
            Ok(models) => app.view.set_models(models),
            Err(e) => warn!(error = %e, "error loading models"),
        },
        Message::SystemLoaded(result) => match result {
            Ok(info) => app.view.system = Some(info),
            Err(e) => warn!(error = %e, "error loading system info"),
        },
        Message::Session(session, update) => {
            if session != app.current_session {
                return Task::none();
            }
            match update {
                SessionUpdate::Render(state) => app.view.download = state,
                SessionUpdate::ResetForm => app.view.reset_download_form(),
                SessionUpdate::RefreshModels => return load_models(app),
            }
        }
        Message::SessionFinished(session, outcome) => {
            info!(session, ?outcome, "download session finished");
            if session == app.current_session {
                app.session_cancel = None;
            }
        }
        Message::DeleteConfirmed(name, confirmed) => {
            if confirmed {
                let client = app.api_client.clone();
                return lifecycle_task(async move {
                    client
                        .delete_model(&name)
                        .await
                        .map(|_| "Model deleted successfully".to_string())
                        .map_err(|e| failure_text("Failed to delete model", e))
                });
            }
        }
        Message::LifecycleDone(result) => {
            return match result {
                Ok(message) => Task::batch([
                    show_toast(app, message, ToastKind::Success),
                    load_models(app),
                ]),
                Err(message) => show_toast(app, message, ToastKind::Error),
            };
        }
        Message::Generated(result) => {
            app.view.generated_text = Some(result.unwrap_or_else(|e| e));
        }
        Message::ToastExpired(id) => {
            if app.view.toast.as_ref().is_some_and(|t| t.id == id) {
                app.view.toast = None;
            }
        }
    }
    Task::none()
}

pub fn view(app: &DashboardApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

pub fn subscription(app: &DashboardApp) -> Subscription<Message> {
    iced::time::every(app.api_client.config().refresh_interval).map(|_| Message::Tick)
}

fn start_download(app: &mut DashboardApp) -> Task<Message> {
    let request = DownloadRequest {
        model_name: app.view.model_name.trim().to_string(),
        hf_model_id: app.view.hf_model_id.trim().to_string(),
    };
    if let Err(e) = validate_request(&request) {
        app.view.form_error = Some(e.to_string());
        return Task::none();
    }

    // Only one session drives the panel; the previous one stops reading.
    if let Some(previous) = app.session_cancel.take() {
        previous.cancel();
    }
    app.current_session += 1;
    let session = app.current_session;
    let cancel = CancellationToken::new();
    app.session_cancel = Some(cancel.clone());

    app.view.form_error = None;
    app.view.download = Default::default();
    app.view.download_active = true;

    let (sink, updates) = ChannelSink::new(session);
    let controller =
        DownloadSessionController::new(app.api_client.clone(), sink).with_cancellation(cancel);
    let finished = futures::stream::once(async move {
        let outcome = controller.run(request).await;
        Message::SessionFinished(session, outcome)
    });

    // The update channel closes when the controller (and its sink) is dropped.
    Task::stream(futures::stream::select(
        updates.map(|(session, update)| Message::Session(session, update)),
        finished,
    ))
}

fn start_generation(app: &mut DashboardApp) -> Task<Message> {
    let request = match app.view.generate_request() {
        Ok(request) => request,
        Err(e) => {
            app.view.generated_text = Some(format!("Error: {}", e));
            return Task::none();
        }
    };

    app.view.generated_text = Some("Generating...".to_string());
    let client = app.api_client.clone();
    Task::perform(
        async move {
            match client.generate(&request).await {
                Ok(text) => Ok(text),
                Err(ApiError::ApiError(detail)) => Err(format!("Error: {}", detail)),
                Err(e) => {
                    warn!(error = %e, "generation error");
                    Err("Generation failed".to_string())
                }
            }
        },
        Message::Generated,
    )
}

fn refresh_all(app: &DashboardApp) -> Task<Message> {
    Task::batch([load_models(app), load_system(app)])
}

fn load_models(app: &DashboardApp) -> Task<Message> {
    let client = app.api_client.clone();
    Task::perform(
        async move { client.list_models().await.map_err(|e| e.to_string()) },
        Message::ModelsLoaded,
    )
}

fn load_system(app: &DashboardApp) -> Task<Message> {
    let client = app.api_client.clone();
    Task::perform(
        async move { client.system_info().await.map_err(|e| e.to_string()) },
        Message::SystemLoaded,
    )
}

fn lifecycle_task(
    action: impl std::future::Future<Output = Result<String, String>> + Send + 'static,
) -> Task<Message> {
    Task::perform(action, Message::LifecycleDone)
}

fn failure_text(prefix: &str, error: ApiError) -> String {
    warn!(error = %error, "{}", prefix);
    match error {
        ApiError::ApiError(detail) => format!("{}: {}", prefix, detail),
        _ => prefix.to_string(),
    }
}

fn show_toast(app: &mut DashboardApp, message: String, kind: ToastKind) -> Task<Message> {
    app.next_toast += 1;
    let id = app.next_toast;
    app.view.toast = Some(Toast { id, message, kind });

    Task::perform(tokio::time::sleep(TOAST_LIFETIME), move |_| {
        Message::ToastExpired(id)
    })
}

async fn confirm_delete(model_name: String) -> bool {
    let answer = rfd::AsyncMessageDialog::new()
        .set_level(rfd::MessageLevel::Warning)
        .set_title("Delete model")
        .set_description(format!(
            "Are you sure you want to delete model \"{}\"?",
            model_name
        ))
        .set_buttons(rfd::MessageButtons::YesNo)
        .show()
        .await;

    matches!(answer, rfd::MessageDialogResult::Yes)
}

use iced::{
    widget::{
        button, column, container, pick_list, progress_bar, row, scrollable, text, text_input,
        Space,
    },
    Element, Length,
};

use crate::{
    api::{GenerateRequest, ModelSummary, SystemInfo, UsageStat},
    domain::{AppError, DownloadPhase, DownloadState},
    utils::format_bytes,
};

const DEFAULT_MAX_TOKENS: &str = "100";
const DEFAULT_TEMPERATURE: &str = "0.7";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
}

/// Main view state
pub struct DashboardView {
    pub models: Vec<ModelSummary>,
    pub system: Option<SystemInfo>,
    pub model_name: String,
    pub hf_model_id: String,
    pub form_error: Option<String>,
    pub download: DownloadState,
    /// Set from submission until the completed session resets the form.
    pub download_active: bool,
    pub generate_model: Option<String>,
    pub prompt: String,
    pub max_tokens: String,
    pub temperature: String,
    pub generated_text: Option<String>,
    pub toast: Option<Toast>,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            system: None,
            model_name: String::new(),
            hf_model_id: String::new(),
            form_error: None,
            download: DownloadState::default(),
            download_active: false,
            generate_model: None,
            prompt: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS.to_string(),
            temperature: DEFAULT_TEMPERATURE.to_string(),
            generated_text: None,
            toast: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DashboardMessage {
    ModelNameChanged(String),
    HfModelIdChanged(String),
    DownloadPressed,
    RefreshPressed,
    LoadPressed(String),
    UnloadPressed(String),
    DeletePressed(String),
    GenerateModelSelected(String),
    PromptChanged(String),
    MaxTokensChanged(String),
    TemperatureChanged(String),
    GeneratePressed,
    DismissToast,
}

impl DashboardView {
    pub fn update(&mut self, message: DashboardMessage) {
        match message {
            DashboardMessage::ModelNameChanged(name) => {
                self.model_name = name;
                self.form_error = None;
            }
            DashboardMessage::HfModelIdChanged(id) => {
                self.hf_model_id = id;
                self.form_error = None;
            }
            DashboardMessage::GenerateModelSelected(name) => self.generate_model = Some(name),
            DashboardMessage::PromptChanged(prompt) => self.prompt = prompt,
            DashboardMessage::MaxTokensChanged(value) => self.max_tokens = value,
            DashboardMessage::TemperatureChanged(value) => self.temperature = value,
            DashboardMessage::DismissToast => self.toast = None,
            DashboardMessage::DownloadPressed
            | DashboardMessage::RefreshPressed
            | DashboardMessage::LoadPressed(_)
            | DashboardMessage::UnloadPressed(_)
            | DashboardMessage::DeletePressed(_)
            | DashboardMessage::GeneratePressed => {
                // Will be handled by the app
            }
        }
    }

    /// Replace the model list, dropping a generation target that is no
    /// longer loaded.
    pub fn set_models(&mut self, models: Vec<ModelSummary>) {
        self.models = models;
        let still_loaded = self
            .generate_model
            .as_ref()
            .is_some_and(|name| self.loaded_model_names().contains(name));
        if !still_loaded {
            self.generate_model = None;
        }
    }

    pub fn loaded_model_names(&self) -> Vec<String> {
        self.models
            .iter()
            .filter(|m| m.loaded)
            .map(|m| m.name.clone())
            .collect()
    }

    pub fn reset_download_form(&mut self) {
        self.model_name.clear();
        self.hf_model_id.clear();
        self.form_error = None;
        self.download_active = false;
    }

    pub fn generate_request(&self) -> Result<GenerateRequest, AppError> {
        let model_name = self
            .generate_model
            .clone()
            .ok_or_else(|| AppError::InvalidInput("select a loaded model".to_string()))?;
        let max_tokens = self.max_tokens.trim().parse().map_err(|_| {
            AppError::InvalidInput("max tokens must be a whole number".to_string())
        })?;
        let temperature = self
            .temperature
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidInput("temperature must be a number".to_string()))?;

        Ok(GenerateRequest {
            model_name,
            prompt: self.prompt.clone(),
            max_tokens,
            temperature,
        })
    }

    fn show_download_panel(&self) -> bool {
        self.download_active || self.download.is_visible()
    }

    pub fn view(&self) -> Element<'_, DashboardMessage> {
        let header = row![
            text("Model Dashboard").size(32),
            Space::new().width(Length::Fill),
            button("Refresh")
                .on_press(DashboardMessage::RefreshPressed)
                .padding([8, 16]),
        ];

        let mut page = column![header, self.system_panel()].spacing(16);
        if let Some(toast) = &self.toast {
            page = page.push(self.toast_view(toast));
        }

        let sidebar = column![self.download_section(), self.generate_section()]
            .spacing(24)
            .width(Length::FillPortion(2));
        let models = column![text("Models").size(20), self.models_list()]
            .spacing(10)
            .width(Length::FillPortion(3));

        page.push(row![models, sidebar].spacing(24))
            .padding(20)
            .into()
    }

    fn toast_view<'a>(&self, toast: &'a Toast) -> Element<'a, DashboardMessage> {
        let message = match toast.kind {
            ToastKind::Success => text(&toast.message).style(text::success),
            ToastKind::Error => text(&toast.message).style(text::danger),
        };
        container(
            row![
                message,
                Space::new().width(Length::Fill),
                button("×")
                    .on_press(DashboardMessage::DismissToast)
                    .style(button::text),
            ]
            .spacing(10),
        )
        .padding(10)
        .style(container::rounded_box)
        .into()
    }

    fn system_panel(&self) -> Element<'_, DashboardMessage> {
        let Some(info) = &self.system else {
            return text("System status unavailable").size(14).into();
        };

        row![
            usage_bar("Memory", &info.memory),
            usage_bar("Disk", &info.disk),
            text(format!("CPU: {:.1}%", info.cpu_percent)).size(14),
        ]
        .spacing(20)
        .into()
    }

    fn models_list(&self) -> Element<'_, DashboardMessage> {
        if self.models.is_empty() {
            return text("No models downloaded yet").size(14).into();
        }

        scrollable(column(self.models.iter().map(model_card)).spacing(10)).into()
    }

    fn download_section(&self) -> Element<'_, DashboardMessage> {
        let mut section = column![
            text("Download Model").size(20),
            text_input("Model name", &self.model_name)
                .on_input(DashboardMessage::ModelNameChanged)
                .padding(8),
            text_input("Hugging Face repo id (owner/name)", &self.hf_model_id)
                .on_input(DashboardMessage::HfModelIdChanged)
                .on_submit(DashboardMessage::DownloadPressed)
                .padding(8),
            button("Download")
                .on_press(DashboardMessage::DownloadPressed)
                .padding([8, 16]),
        ]
        .spacing(10);

        if let Some(error) = &self.form_error {
            section = section.push(text(error).size(13).style(text::danger));
        }
        if self.show_download_panel() {
            section = section.push(self.progress_panel());
        }
        section.into()
    }

    fn progress_panel(&self) -> Element<'_, DashboardMessage> {
        let state = &self.download;
        let status = match state.phase {
            DownloadPhase::Idle => "Starting download...".to_string(),
            _ => state.status_text(),
        };

        let bar = progress_bar(0.0..=100.0, f32::from(state.percent));
        let bar = match state.phase {
            DownloadPhase::Failed => bar.style(progress_bar::danger),
            DownloadPhase::Completed => bar.style(progress_bar::success),
            _ => bar,
        };

        column![
            row![
                text(status).size(14),
                Space::new().width(Length::Fill),
                text(format!("{}%", state.percent)).size(14),
            ],
            bar,
            text(&state.file_label).size(12),
        ]
        .spacing(6)
        .into()
    }

    fn generate_section(&self) -> Element<'_, DashboardMessage> {
        let mut section = column![
            text("Generate Text").size(20),
            pick_list(
                self.loaded_model_names(),
                self.generate_model.clone(),
                DashboardMessage::GenerateModelSelected,
            )
            .placeholder("Select a loaded model"),
            text_input("Prompt", &self.prompt)
                .on_input(DashboardMessage::PromptChanged)
                .padding(8),
            row![
                text_input("Max tokens", &self.max_tokens)
                    .on_input(DashboardMessage::MaxTokensChanged)
                    .padding(8),
                text_input("Temperature", &self.temperature)
                    .on_input(DashboardMessage::TemperatureChanged)
                    .padding(8),
            ]
            .spacing(10),
            button("Generate")
                .on_press(DashboardMessage::GeneratePressed)
                .padding([8, 16]),
        ]
        .spacing(10);

        if let Some(generated) = &self.generated_text {
            section = section.push(
                container(text(generated).size(14))
                    .padding(10)
                    .width(Length::Fill)
                    .style(container::rounded_box),
            );
        }
        section.into()
    }
}

fn usage_bar<'a>(label: &str, usage: &UsageStat) -> Element<'a, DashboardMessage> {
    let caption = match (usage.used, usage.total) {
        (Some(used), Some(total)) => format!(
            "{}: {:.1}% ({} / {})",
            label,
            usage.percent,
            format_bytes(used),
            format_bytes(total)
        ),
        _ => format!("{}: {:.1}%", label, usage.percent),
    };

    column![
        text(caption).size(14),
        progress_bar(0.0..=100.0, usage.percent.clamp(0.0, 100.0)),
    ]
    .spacing(4)
    .width(Length::Fill)
    .into()
}

fn model_card(model: &ModelSummary) -> Element<'_, DashboardMessage> {
    let badge = if model.loaded {
        text("Loaded").size(12).style(text::success)
    } else {
        text("Unloaded").size(12)
    };
    let toggle = if model.loaded {
        button("Unload").on_press(DashboardMessage::UnloadPressed(model.name.clone()))
    } else {
        button("Load").on_press(DashboardMessage::LoadPressed(model.name.clone()))
    };

    container(
        column![
            row![
                text(&model.name).size(16),
                Space::new().width(Length::Fill),
                badge
            ],
            text(&model.hf_model_id).size(12),
            text(match &model.format {
                Some(format) => format!("Size: {} · {}", format_bytes(model.size), format),
                None => format!("Size: {}", format_bytes(model.size)),
            })
            .size(12),
            row![
                toggle,
                button("Delete")
                    .style(button::danger)
                    .on_press(DashboardMessage::DeletePressed(model.name.clone())),
            ]
            .spacing(10),
        ]
        .spacing(6),
    )
    .padding(12)
    .width(Length::Fill)
    .style(container::rounded_box)
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, loaded: bool) -> ModelSummary {
        ModelSummary {
            name: name.to_string(),
            hf_model_id: format!("org/{}", name),
            size: 0,
            loaded,
            format: None,
        }
    }

    #[test]
    fn test_set_models_keeps_loaded_selection() {
        let mut view = DashboardView::default();
        view.generate_model = Some("tiny".to_string());
        view.set_models(vec![model("tiny", true), model("big", false)]);
        assert_eq!(view.generate_model.as_deref(), Some("tiny"));
        assert_eq!(view.loaded_model_names(), vec!["tiny".to_string()]);

        view.set_models(vec![model("tiny", false)]);
        assert_eq!(view.generate_model, None);
    }

    #[test]
    fn test_generate_request_defaults() {
        let mut view = DashboardView::default();
        assert!(view.generate_request().is_err());

        view.update(DashboardMessage::GenerateModelSelected("tiny".to_string()));
        view.update(DashboardMessage::PromptChanged("Hello".to_string()));
        let request = view.generate_request().unwrap();
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.prompt, "Hello");
    }

    #[test]
    fn test_generate_request_rejects_bad_numbers() {
        let mut view = DashboardView::default();
        view.generate_model = Some("tiny".to_string());
        view.max_tokens = "lots".to_string();
        assert!(view.generate_request().is_err());
    }

    #[test]
    fn test_failed_download_keeps_panel_and_form() {
        let mut view = DashboardView::default();
        view.model_name = "tiny".to_string();
        view.download = DownloadState {
            phase: DownloadPhase::Failed,
            error_message: Some("disk full".to_string()),
            ..Default::default()
        };
        assert!(view.show_download_panel());
        assert_eq!(view.model_name, "tiny");

        view.download = DownloadState::default();
        view.reset_download_form();
        assert!(!view.show_download_panel());
        assert!(view.model_name.is_empty());
    }
}

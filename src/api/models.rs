use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::client::ApiError;

/// Environment variable overriding the backend address.
pub const BASE_URL_ENV: &str = "MODEL_DASHBOARD_URL";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";

/// Body of `POST /api/models/download`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub model_name: String,
    pub hf_model_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Starting,
    Downloading,
    Completed,
    Error,
}

/// One `data: ` frame of the download progress stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventRecord {
    pub status: EventStatus,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub total_files: u32,
    #[serde(default)]
    pub downloaded_files: u32,
}

/// Entry of the `/api/models` listing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub hf_model_id: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UsageStat {
    pub percent: f32,
    #[serde(default)]
    pub used: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Response from the `/api/system` endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SystemInfo {
    pub memory: UsageStat,
    pub disk: UsageStat,
    pub cpu_percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model_name: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub generated_text: String,
}

/// FastAPI-style error body
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// Configuration for the API client and dashboard timers
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    /// How long a finished download stays on screen before the list refresh
    pub completion_delay: Duration,
    pub refresh_interval: Duration,
}

impl ApiConfig {
    pub fn with_base_url(base_url: &str) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::NotABaseUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            ..Default::default()
        })
    }

    /// Read the backend address from `MODEL_DASHBOARD_URL`, falling back to
    /// the local default.
    pub fn from_env() -> Result<Self, ApiError> {
        match std::env::var(BASE_URL_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::with_base_url(value.trim()),
            _ => Ok(Self::default()),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            completion_delay: Duration::from_millis(2000),
            refresh_interval: Duration::from_secs(5),
        }
    }
}

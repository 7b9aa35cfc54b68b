use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use thiserror::Error;
use url::Url;

use super::models::{
    ApiConfig, DownloadRequest, ErrorDetail, GenerateRequest, GenerateResponse, ModelSummary,
    ModelsResponse, SystemInfo,
};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{0} cannot be used as a base URL")]
    NotABaseUrl(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Raw body of a streaming response, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<bytes::Bytes>>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Builds `{base}/{segments...}`, percent-encoding each segment so model
    /// names can't escape their path position.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::NotABaseUrl(self.config.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turns a non-2xx response into `ApiError::ApiError`, preferring the
    /// server's `detail` field over the bare status line.
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorDetail>(&body)
            .map(|e| e.detail)
            .unwrap_or_else(|_| status.to_string());
        Err(ApiError::ApiError(message))
    }

    pub async fn list_models(&self) -> Result<Vec<ModelSummary>> {
        let url = self.endpoint(&["api", "models"])?;
        let response = Self::check_status(self.http.get(url).send().await?).await?;

        let json: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;
        Ok(json.models)
    }

    pub async fn system_info(&self) -> Result<SystemInfo> {
        let url = self.endpoint(&["api", "system"])?;
        let response = Self::check_status(self.http.get(url).send().await?).await?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Starts a model download and hands back the progress stream body.
    ///
    /// Fails before any chunk is read if the server refuses the request
    /// (e.g. the model name already exists).
    pub async fn start_download(&self, request: &DownloadRequest) -> Result<ByteStream> {
        let url = self.endpoint(&["api", "models", "download"])?;
        let response = self.http.post(url).json(request).send().await?;
        let response = Self::check_status(response).await?;

        let stream = response
            .bytes_stream()
            .map_err(ApiError::RequestError)
            .boxed();
        Ok(stream)
    }

    pub async fn load_model(&self, model_name: &str) -> Result<()> {
        let url = self.endpoint(&["api", "models", model_name, "load"])?;
        Self::check_status(self.http.post(url).send().await?).await?;
        Ok(())
    }

    pub async fn unload_model(&self, model_name: &str) -> Result<()> {
        let url = self.endpoint(&["api", "models", model_name, "unload"])?;
        Self::check_status(self.http.post(url).send().await?).await?;
        Ok(())
    }

    pub async fn delete_model(&self, model_name: &str) -> Result<()> {
        let url = self.endpoint(&["api", "models", model_name])?;
        Self::check_status(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let url = self.endpoint(&["api", "generate"])?;
        let response = self.http.post(url).json(request).send().await?;
        let response = Self::check_status(response).await?;

        let json: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;
        Ok(json.generated_text)
    }
}

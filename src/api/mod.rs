pub mod client;
pub mod models;

pub use client::{ApiClient, ApiError};
pub use models::{
    ApiConfig, DownloadRequest, EventRecord, EventStatus, GenerateRequest, ModelSummary,
    SystemInfo, UsageStat, BASE_URL_ENV,
};

mod api;
mod app;
mod application;
mod domain;
mod ui;
mod utils;

use tracing_subscriber::EnvFilter;

use crate::api::{ApiConfig, BASE_URL_ENV};

fn init_tracing() {
    // RUST_LOG wins; otherwise info for everything
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}

fn main() -> iced::Result {
    init_tracing();

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid {}", BASE_URL_ENV);
            std::process::exit(2);
        }
    };
    tracing::info!(backend = %config.base_url, "starting model dashboard");

    iced::application(
        move || app::DashboardApp::boot(config.clone()),
        app::update,
        app::view,
    )
    .title("Model Dashboard")
    .subscription(app::subscription)
    .run()
}

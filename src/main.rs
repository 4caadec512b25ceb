mod app;
mod auth;
mod config;
mod db;
mod donations;
mod error;
mod notify;
mod otp;
mod profiles;
mod state;
mod users;

use crate::{app::build_app, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "church_backend=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    sqlx::migrate!("./migrations").run(app_state.db.pool()).await?;

    if let Some(every) = app_state.config.otp_sweep_interval() {
        otp::sweeper::spawn(app_state.db.clone(), every, app_state.config.tx_timeout());
    }

    let addr = app_state.config.listen_addr;
    app::serve(build_app(app_state), addr).await
}

mod api;
mod error;
mod metrics;

use anyhow::Result;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = common::config::Config::load()?;

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("ideafund-web", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    tracing::info!("ideafund web starting");

    metrics::install_prometheus(config.observability.prometheus_port)?;
    metrics::describe();

    let db = common::db::AsyncDb::open(&config.database.path).await?;

    let web_host = config
        .web
        .as_ref()
        .map_or("0.0.0.0".to_string(), |w| w.host.clone());
    let web_port = config.web.as_ref().map_or(8080, |w| w.port);
    let api_key = config.web.as_ref().and_then(|w| w.api_key.clone());

    let state = Arc::new(api::AppState {
        db,
        voting: config.voting.clone(),
        scoring: config.scoring.clone(),
        started_at: chrono::Utc::now(),
        api_key,
    });

    let app = api::router(state);
    let addr = format!("{web_host}:{web_port}");
    tracing::info!(addr = %addr, "ideafund API listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

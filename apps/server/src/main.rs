#![warn(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use skyprobe::reporter::{JsonLinesSink, LogSink, MetricsSink, SlackNotifier};
use skyprobe::{ProberKind, Reporter};
use tracing::info;

mod error;
mod routes;
mod settings;

use error::AppError;
use settings::Settings;

/// Shared by every request handler
#[derive(Debug, Clone)]
pub struct WorkerState {
    pub region: String,
    pub prober: ProberKind,
    pub reporter: Reporter,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logger::init();

    let settings = Settings::from_env()?;
    let sink: Arc<dyn MetricsSink> = match &settings.metrics_path {
        Some(path) => Arc::new(JsonLinesSink::new(path)),
        None => Arc::new(LogSink),
    };
    let reporter = Reporter::new(Arc::new(SlackNotifier::new()?), sink);

    let state = web::Data::new(WorkerState {
        region: settings.region.clone(),
        prober: settings.prober,
        reporter,
    });

    info!(
        "{} worker for {} listening on {}",
        settings.prober, settings.region, settings.bind
    );
    run_server(settings, state).await
}

async fn run_server(settings: Settings, state: web::Data<WorkerState>) -> Result<(), AppError> {
    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .bind(settings.bind)?
        .run()
        .await?;

    Ok(())
}

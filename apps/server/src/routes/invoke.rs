use actix_web::{HttpResponse, post, web};
use serde_json::json;
use skyprobe::{Invocation, ProbeContext, worker};
use tracing::info;

use crate::WorkerState;
use crate::error::AppError;

/// Run one probe for the posted invocation payload
#[post("/invoke")]
pub async fn invoke_route(
    state: web::Data<WorkerState>,
    payload: web::Json<Invocation>,
) -> Result<HttpResponse, AppError> {
    info!("invocation for {} {}", payload.method, payload.target);

    let context = ProbeContext::new(state.region.clone(), state.reporter.clone());
    worker::execute(state.prober, context, &payload).await?;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

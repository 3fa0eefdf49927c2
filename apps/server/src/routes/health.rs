use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;

use crate::WorkerState;

/// Health check route, also reports which region and prober this worker serves
#[get("/")]
pub async fn health_route(state: web::Data<WorkerState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "region": state.region,
        "prober": state.prober,
    }))
}

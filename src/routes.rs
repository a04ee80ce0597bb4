mod submit;

pub use submit::*;

use std::sync::Arc;

use actix_web::error::{InternalError, JsonPayloadError, QueryPayloadError};
use actix_web::{post, web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;

use crate::orchestrator::Orchestrator;

#[derive(Serialize)]
struct ErrorResponse {
    reason: &'static str,
    code: u32,
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
    });
    InternalError::from_response(err, response).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
    });
    InternalError::from_response(err, response).into()
}

/// NOTE: DO NOT REMOVE: used in automatic testing
#[post("/internal/exit")]
#[allow(unreachable_code)]
pub async fn exit(orchestrator: web::Data<Arc<Orchestrator>>) -> impl Responder {
    log::info!("Shutdown as requested");
    orchestrator.job_queue.shutdown();
    std::process::exit(0);
    "Exited".to_string()
}

use std::sync::Arc;

use actix_web::{post, web, HttpResponse, Responder};
use serde::Deserialize;

use crate::orchestrator::Orchestrator;
use crate::types::Submission;

/// Intake body for `POST /submit`. Field names match the sync-endpoint
/// counterpart's `PascalCase` convention so the same JSON vocabulary is used
/// on both sides of the wire.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(rename = "SubmissionID")]
    pub submission_id: String,
    #[serde(rename = "TaskID")]
    pub task_id: String,
    #[serde(rename = "TargLang")]
    pub targ_lang: String,
    #[serde(rename = "Code")]
    pub code: Vec<String>,
}

/// Decodes the submission, hands it to the orchestrator, and returns
/// immediately — grading happens on a detached task and results stream out
/// through the status broadcaster, not this response. Kept intentionally
/// thin: no business logic lives in the handler itself.
#[post("/submit")]
pub async fn submit_handler(
    orchestrator: web::Data<Arc<Orchestrator>>,
    body: web::Json<SubmitRequest>,
) -> impl Responder {
    let submission = Submission {
        submission_id: body.submission_id.clone(),
        task_id: body.task_id.clone(),
        language_id: body.targ_lang.clone(),
        source: body.code.clone(),
    };
    let submission_id = submission.submission_id.clone();

    let orchestrator = orchestrator.get_ref().clone();
    tokio::spawn(async move {
        orchestrator.grade(submission).await;
    });

    HttpResponse::Ok().body(format!("Successful submission: {submission_id}"))
}

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::auth::Claims;
use crate::services::orchestrator::OperationOrchestrator;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionRequest {
    pub reason: Option<String>,
}

/// Patient accepted the proposed staff/slot. Idempotent in effect: a second
/// approval of the same case surfaces a state-transition conflict rather
/// than reapplying the change.
pub async fn approve_case(
    _claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let case = orchestrator
        .process_patient_approval(path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        case,
        "Reassignment confirmed",
    )))
}

pub async fn reject_case(
    _claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    path: web::Path<Uuid>,
    input: web::Json<RejectionRequest>,
) -> Result<HttpResponse, AppError> {
    let reason = input
        .into_inner()
        .reason
        .unwrap_or_else(|| "no reason given".to_string());

    let case = orchestrator
        .process_patient_rejection(path.into_inner(), reason)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        case,
        "Response recorded",
    )))
}

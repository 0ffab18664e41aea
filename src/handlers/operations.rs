use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::OperationInput;
use crate::error::AppError;
use crate::handlers::shared::ApiResponse;
use crate::services::auth::Claims;
use crate::services::orchestrator::OperationOrchestrator;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub clinic_id: Uuid,
    pub staff_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Dry run: what executing this unavailability would do, without touching
/// any appointment.
pub async fn preview_operation(
    claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    input: web::Json<PreviewRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = claims.actor();
    let preview = orchestrator
        .preview(
            &actor,
            input.clinic_id,
            input.staff_id,
            input.start_date,
            input.end_date,
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(preview)))
}

pub async fn create_operation(
    claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    input: web::Json<OperationInput>,
) -> Result<HttpResponse, AppError> {
    let actor = claims.actor();
    let operation = orchestrator.create(&actor, input.into_inner()).await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(operation)))
}

pub async fn get_operation(
    claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = claims.actor();
    let operation = orchestrator
        .get_operation(&actor, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(operation)))
}

/// Kick off the reassignment workflow over every affected appointment.
pub async fn execute_operation(
    claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = claims.actor();
    let operation = orchestrator.execute(&actor, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        operation,
        "Operation executed",
    )))
}

pub async fn cancel_operation(
    claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = claims.actor();
    let operation = orchestrator.cancel(&actor, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        operation,
        "Operation cancelled",
    )))
}

pub async fn get_operation_stats(
    claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = claims.actor();
    let stats = orchestrator.get_stats(&actor, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

pub async fn get_operation_activity(
    claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = claims.actor();
    let activity = orchestrator
        .operation_activity(&actor, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(activity)))
}

pub async fn list_operation_cases(
    claims: Claims,
    orchestrator: web::Data<OperationOrchestrator>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = claims.actor();
    let cases = orchestrator.list_cases(&actor, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(cases)))
}

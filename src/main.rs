use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware::Logger, web};
use anyhow::Result;

use clinic_be::database::{
    init_database,
    repositories::{
        ActivityRepository, AppointmentRepository, CaseRepository, OperationRepository,
        PeriodRepository, StaffRepository,
    },
};
use clinic_be::handlers::{cases, operations};
use clinic_be::middleware::RequestId;
use clinic_be::services::{
    AuditLogger, ConflictDetector, LeaveLedger, LoggingGateway, OperationOrchestrator,
    ReassignmentPlanner, ReassignmentPolicy,
};
use clinic_be::Config;

#[get("/")]
async fn hello() -> impl Responder {
    HttpResponse::Ok().body("Clinic Scheduling API v1.0")
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now()
    }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    log::info!(
        "Configuration loaded (environment: {})",
        config.environment
    );

    let pool = init_database(&config.database_url).await?;
    log::info!("Database initialized");

    let appointment_repository = AppointmentRepository::new(pool.clone());
    let staff_repository = StaffRepository::new(pool.clone());
    let operation_repository = OperationRepository::new(pool.clone());
    let case_repository = CaseRepository::new(pool.clone());
    let period_repository = PeriodRepository::new(pool.clone());
    let activity_repository = ActivityRepository::new(pool.clone());

    let policy = ReassignmentPolicy::from_config(&config);
    let conflict_detector = ConflictDetector::new(appointment_repository.clone());
    let planner = ReassignmentPlanner::new(
        appointment_repository.clone(),
        staff_repository.clone(),
        period_repository.clone(),
        conflict_detector,
        policy,
    );
    let ledger = LeaveLedger::new(staff_repository.clone());
    let audit_logger = AuditLogger::new(activity_repository);

    let orchestrator = OperationOrchestrator::new(
        pool.clone(),
        operation_repository,
        case_repository,
        appointment_repository,
        period_repository,
        staff_repository,
        planner,
        ledger,
        Arc::new(LoggingGateway),
        audit_logger,
    );

    let orchestrator_data = web::Data::new(orchestrator);
    let config_data = web::Data::new(config.clone());

    let server_address = config.server_address();
    log::info!("Server starting on http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .app_data(orchestrator_data.clone())
            .app_data(config_data.clone())
            .wrap(
                Cors::default()
                    .allowed_origin("http://localhost:3000")
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        "Authorization",
                        "Content-Type",
                        "Accept",
                        "X-Requested-With",
                        "X-Correlation-ID",
                    ])
                    .max_age(3600),
            )
            .wrap(RequestId)
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T correlation_id=%{x-correlation-id}o"#,
            ))
            .service(hello)
            .service(health)
            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/operations")
                            .route("", web::post().to(operations::create_operation))
                            .route("/preview", web::post().to(operations::preview_operation))
                            .route("/{id}", web::get().to(operations::get_operation))
                            .route("/{id}/execute", web::post().to(operations::execute_operation))
                            .route("/{id}/cancel", web::post().to(operations::cancel_operation))
                            .route("/{id}/stats", web::get().to(operations::get_operation_stats))
                            .route("/{id}/cases", web::get().to(operations::list_operation_cases))
                            .route(
                                "/{id}/activity",
                                web::get().to(operations::get_operation_activity),
                            ),
                    )
                    .service(
                        web::scope("/cases")
                            .route("/{id}/approve", web::post().to(cases::approve_case))
                            .route("/{id}/reject", web::post().to(cases::reject_case)),
                    ),
            )
    })
    .bind(server_address)?
    .run()
    .await?;

    Ok(())
}

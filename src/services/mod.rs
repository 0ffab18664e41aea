pub mod audit;
pub mod auth;
pub mod conflict;
pub mod ledger;
pub mod notification;
pub mod orchestrator;
pub mod planner;
pub mod policy;

pub use audit::{AuditLogger, DomainEvent};
pub use auth::Claims;
pub use conflict::ConflictDetector;
pub use ledger::LeaveLedger;
pub use notification::{LoggingGateway, NotificationGateway};
pub use orchestrator::OperationOrchestrator;
pub use planner::ReassignmentPlanner;
pub use policy::{AccessPolicy, Actor, ReassignmentPolicy, Role};

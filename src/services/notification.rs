use futures_util::future::BoxFuture;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

/// Result of a delivery attempt; the core only ever looks at `success`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub success: bool,
    pub provider_reference: Option<String>,
    pub error_message: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(provider_reference: String) -> Self {
        Self {
            success: true,
            provider_reference: Some(provider_reference),
            error_message: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_reference: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// What the patient is asked to approve.
#[derive(Debug, Clone)]
pub struct CaseNotification {
    pub case_id: Uuid,
    pub patient_id: Uuid,
    pub candidate_staff_name: String,
    pub proposed_start_time: chrono::DateTime<chrono::Utc>,
}

/// Delivery is an external collaborator; the trait is object safe so tests
/// can swap in scripted gateways. Implementations must not panic on
/// provider errors, they report them through the outcome.
pub trait NotificationGateway: Send + Sync {
    fn send(&self, notification: CaseNotification) -> BoxFuture<'static, DeliveryOutcome>;

    fn channel(&self) -> &'static str;
}

/// Default gateway: logs the notification and fabricates a provider
/// reference. Stands in until a real SMS/email provider is wired up.
pub struct LoggingGateway;

impl NotificationGateway for LoggingGateway {
    fn send(&self, notification: CaseNotification) -> BoxFuture<'static, DeliveryOutcome> {
        Box::pin(async move {
            let reference: u64 = rand::rng().random();
            log::info!(
                "Notifying patient {} for case {}: proposed {} with {} (ref {:016x})",
                notification.patient_id,
                notification.case_id,
                notification.proposed_start_time,
                notification.candidate_staff_name,
                reference
            );
            DeliveryOutcome::delivered(format!("log-{:016x}", reference))
        })
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}

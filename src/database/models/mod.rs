pub mod activity;
pub mod appointment;
pub mod case;
pub mod operation;
pub mod period;
pub mod staff;

pub(crate) mod macros;

pub use activity::{Activity, CreateActivityInput, EntityType};
pub use appointment::{Appointment, AppointmentStatus};
pub use case::{CaseFailureReason, CaseStatus, ReassignmentCase};
pub use operation::{
    OperationInput, OperationStats, OperationStatus, UnavailabilityOperation, UnavailabilityReason,
};
pub use period::{PeriodInput, UnavailabilityPeriod};
pub use staff::{CandidateStaff, Staff};

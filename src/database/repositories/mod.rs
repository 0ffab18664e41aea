pub mod activity;
pub mod appointment;
pub mod case;
pub mod operation;
pub mod period;
pub mod staff;

pub use activity::ActivityRepository;
pub use appointment::AppointmentRepository;
pub use case::CaseRepository;
pub use operation::OperationRepository;
pub use period::PeriodRepository;
pub use staff::StaffRepository;

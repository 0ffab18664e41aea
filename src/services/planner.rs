use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{Appointment, CandidateStaff, CaseFailureReason, UnavailabilityPeriod};
use crate::database::repositories::{AppointmentRepository, PeriodRepository, StaffRepository};
use crate::services::conflict::{ConflictDetector, overlaps};
use crate::services::policy::ReassignmentPolicy;

/// A concrete reassignment suggestion for one appointment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub appointment_id: Uuid,
    pub candidate_staff_id: Uuid,
    pub candidate_staff_name: String,
    pub proposed_start_time: DateTime<Utc>,
    pub proposed_end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanFailure {
    /// No qualified candidate in the clinic at all.
    NoAlternateStaff,
    /// Candidates exist but none has a free slot inside the search window.
    NoAvailableSlot,
}

impl PlanFailure {
    pub fn as_case_reason(self) -> CaseFailureReason {
        match self {
            PlanFailure::NoAlternateStaff => CaseFailureReason::NoAlternateStaff,
            PlanFailure::NoAvailableSlot => CaseFailureReason::NoAvailableSlot,
        }
    }
}

/// Deterministic candidate order: fewest appointments already assigned that
/// day, then ascending staff id. The SQL orders the same way; sorting again
/// here keeps the contract independent of the query plan.
pub fn order_candidates(candidates: &mut [CandidateStaff]) {
    candidates.sort_by(|a, b| a.day_load.cmp(&b.day_load).then(a.id.cmp(&b.id)));
}

fn fits_working_hours(
    start: DateTime<Utc>,
    duration: Duration,
    policy: &ReassignmentPolicy,
) -> bool {
    let day_start = NaiveTime::from_hms_opt(policy.clinic_day_start_hour, 0, 0);
    let day_end = NaiveTime::from_hms_opt(policy.clinic_day_end_hour, 0, 0);
    let (Some(day_start), Some(day_end)) = (day_start, day_end) else {
        return false;
    };

    let end = start + duration;
    start.time() >= day_start
        && end.time() <= day_end
        && start.date_naive() == end.date_naive()
}

/// Declared absences block whole days; expand them to UTC intervals so the
/// slot scan treats them exactly like booked time.
pub fn period_blocks(periods: &[UnavailabilityPeriod]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    periods
        .iter()
        .map(|period| {
            (
                period.start_date.and_time(NaiveTime::MIN).and_utc(),
                (period.end_date + Duration::days(1))
                    .and_time(NaiveTime::MIN)
                    .and_utc(),
            )
        })
        .collect()
}

/// Earliest free slot at or after the original time, stepping by the policy
/// granularity, bounded by the search window and clinic working hours. The
/// busy list is checked with the half-open overlap predicate.
pub fn find_slot(
    original_start: DateTime<Utc>,
    duration: Duration,
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
    policy: &ReassignmentPolicy,
) -> Option<DateTime<Utc>> {
    let window_end = original_start + Duration::days(policy.slot_search_days);

    let mut slot = original_start;
    while slot < window_end {
        let slot_end = slot + duration;
        let blocked = busy.iter().any(|&(s, e)| overlaps(slot, slot_end, s, e));
        if fits_working_hours(slot, duration, policy) && !blocked {
            return Some(slot);
        }
        slot += policy.slot_step;
    }

    None
}

/// Finds a qualified, available alternate staff/slot per appointment.
#[derive(Clone)]
pub struct ReassignmentPlanner {
    appointments: AppointmentRepository,
    staff: StaffRepository,
    periods: PeriodRepository,
    conflicts: ConflictDetector,
    policy: ReassignmentPolicy,
}

impl ReassignmentPlanner {
    pub fn new(
        appointments: AppointmentRepository,
        staff: StaffRepository,
        periods: PeriodRepository,
        conflicts: ConflictDetector,
        policy: ReassignmentPolicy,
    ) -> Self {
        Self {
            appointments,
            staff,
            periods,
            conflicts,
            policy,
        }
    }

    pub fn policy(&self) -> &ReassignmentPolicy {
        &self.policy
    }

    /// Plan one appointment. First pass prefers the original start time;
    /// second pass takes the first candidate (in tie-break order) with any
    /// free slot inside the window.
    pub async fn plan_for(
        &self,
        appointment: &Appointment,
        excluded_staff: &[Uuid],
    ) -> Result<Result<Proposal, PlanFailure>> {
        let day = appointment.start_time.date_naive();
        let mut candidates = self
            .staff
            .find_candidates(
                appointment.clinic_id,
                appointment.service_id,
                excluded_staff,
                day,
            )
            .await?;
        order_candidates(&mut candidates);

        if candidates.is_empty() {
            return Ok(Err(PlanFailure::NoAlternateStaff));
        }

        let duration = appointment.end_time - appointment.start_time;

        // Pass 1: same slot, different staff.
        for candidate in &candidates {
            let free = self
                .conflicts
                .slot_is_free(
                    appointment.clinic_id,
                    candidate.id,
                    appointment.start_time,
                    appointment.end_time,
                    Some(appointment.id),
                )
                .await?;
            if free {
                return Ok(Ok(Proposal {
                    appointment_id: appointment.id,
                    candidate_staff_id: candidate.id,
                    candidate_staff_name: candidate.name.clone(),
                    proposed_start_time: appointment.start_time,
                    proposed_end_time: appointment.end_time,
                }));
            }
        }

        // Pass 2: nearest free slot inside the policy window. The candidate
        // screen only covered the original day, so declared absences on
        // later days must block the scan here.
        let window_end = appointment.start_time + Duration::days(self.policy.slot_search_days);
        for candidate in &candidates {
            let mut busy = self
                .appointments
                .busy_intervals(candidate.id, appointment.start_time, window_end)
                .await?;
            let absences = self
                .periods
                .find_overlapping(
                    candidate.id,
                    appointment.start_time.date_naive(),
                    window_end.date_naive(),
                )
                .await?;
            busy.extend(period_blocks(&absences));
            if let Some(slot) = find_slot(appointment.start_time, duration, &busy, &self.policy) {
                return Ok(Ok(Proposal {
                    appointment_id: appointment.id,
                    candidate_staff_id: candidate.id,
                    candidate_staff_name: candidate.name.clone(),
                    proposed_start_time: slot,
                    proposed_end_time: slot + duration,
                }));
            }
        }

        Ok(Err(PlanFailure::NoAvailableSlot))
    }
}

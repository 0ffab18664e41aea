use anyhow::Result;
use chrono::{Datelike, NaiveDate, Weekday};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::database::repositories::StaffRepository;
use crate::error::AppError;

/// Weekdays (Mon-Fri) in an inclusive date range. Leave is spent in whole
/// weekdays; weekends never touch the balance.
pub fn weekdays_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let mut days = 0;
    let mut current = start;
    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    days
}

/// Debit/credit of the staff vacation balance. The balance is only ever
/// mutated through here, and the decrement rides a guarded UPDATE so
/// concurrent operations for the same staff cannot lose updates.
#[derive(Clone)]
pub struct LeaveLedger {
    staff: StaffRepository,
}

impl LeaveLedger {
    pub fn new(staff: StaffRepository) -> Self {
        Self { staff }
    }

    /// Debit the weekday count of the range and return it for the audit
    /// trail. Fails with `InsufficientBalance` when the balance is short.
    pub async fn debit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        staff_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<i32, AppError> {
        let days = weekdays_between(start, end);
        if days == 0 {
            return Ok(0);
        }

        match self.staff.try_debit_leave(tx, staff_id, days).await? {
            Some(new_balance) => {
                log::info!(
                    "Debited {} leave day(s) from staff {} (balance now {})",
                    days,
                    staff_id,
                    new_balance
                );
                Ok(days)
            }
            None => {
                let available = self
                    .staff
                    .get_leave_balance(staff_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", staff_id)))?;
                Err(AppError::InsufficientBalance {
                    required: days,
                    available,
                })
            }
        }
    }

    /// Reverse a previous debit.
    pub async fn credit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        staff_id: Uuid,
        days: i32,
    ) -> Result<(), AppError> {
        if days == 0 {
            return Ok(());
        }
        let new_balance = self.staff.credit_leave(tx, staff_id, days).await?;
        log::info!(
            "Credited {} leave day(s) back to staff {} (balance now {})",
            days,
            staff_id,
            new_balance
        );
        Ok(())
    }
}

// src/attendance.rs
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PolicyError, Result};
use crate::payroll::percent_of;
use crate::records::{AttendanceRecord, AttendanceStatus, Penalties, RequestKind, RequestStatus};
use crate::service::{new_id, HrService};
use crate::settings::{AttendanceRules, SystemSettings};
use crate::store::Repository;

// --- Classification ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: AttendanceStatus,
    pub message: String,
    pub penalties: Penalties,
}

impl Classification {
    /// The wage deduction as an amount of money for the given daily wage.
    pub fn deduction_amount(&self, daily_wage: Decimal) -> Decimal {
        percent_of(daily_wage, self.penalties.wage_deduction)
    }
}

/// Minutes between work start and check-in; 0 when on time.
pub fn late_penalty_minutes(check_in: NaiveTime, rules: &AttendanceRules) -> i64 {
    (check_in - rules.work_start).num_minutes().max(0)
}

/// Classifies a check-in against the absolute-time thresholds. First matching rule wins.
/// Never touches the store.
pub fn classify_check_in(
    check_in: Option<NaiveTime>,
    has_permission: bool,
    settings: &SystemSettings,
) -> Classification {
    let rules = &settings.attendance_rules;
    let Some(time) = check_in else {
        return absent("No check-in recorded", settings);
    };
    let minutes_late = late_penalty_minutes(time, rules) as u32;
    let late = |message: &str| Classification {
        status: AttendanceStatus::Late { minutes_late },
        message: message.to_string(),
        penalties: Penalties {
            wage_deduction: rules.late_percent,
            vacation_day_deducted: false,
        },
    };

    if time <= rules.work_start {
        Classification {
            status: AttendanceStatus::present(),
            message: "On time".to_string(),
            penalties: Penalties::none(),
        }
    } else if time <= rules.late_threshold && has_permission {
        Classification {
            status: AttendanceStatus::Present {
                late_permission: true,
                tardiness_waived: false,
            },
            message: "Late with permission".to_string(),
            penalties: Penalties::none(),
        }
    } else if time <= rules.late_threshold {
        late("Late")
    } else if time < rules.absent_threshold {
        late("Very late")
    } else {
        absent(
            &format!("Arrived after {}", rules.absent_threshold.format("%H:%M")),
            settings,
        )
    }
}

fn absent(message: &str, settings: &SystemSettings) -> Classification {
    Classification {
        status: AttendanceStatus::Absent,
        message: message.to_string(),
        penalties: absence_penalties(settings),
    }
}

pub(crate) fn absence_penalties(settings: &SystemSettings) -> Penalties {
    Penalties {
        wage_deduction: settings.absence_penalty.percent,
        vacation_day_deducted: settings.absence_penalty.vacation_deduction > 0,
    }
}

// --- Store-backed operations ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDayReport {
    pub date: Option<NaiveDate>,
    pub auto_checked_out: Vec<String>,
    pub marked_absent: Vec<String>,
}

impl<R: Repository> HrService<R> {
    pub fn check_in(&mut self, employee_id: &str, date: NaiveDate, time: NaiveTime) -> Result<AttendanceRecord> {
        let employee = self.find_employee(employee_id)?;
        let mut records = self.attendance()?;
        let existing = records
            .iter()
            .position(|r| r.employee_id == employee_id && r.date == date);
        if let Some(idx) = existing {
            // Only a sweep-made absence may be replaced by a physical check-in.
            let record = &records[idx];
            if record.check_in_time.is_some() || record.status != AttendanceStatus::Absent {
                return Err(PolicyError::AlreadyCheckedIn {
                    employee_id: employee_id.to_string(),
                    date,
                });
            }
        }

        let has_permission = self.requests()?.iter().any(|r| {
            r.employee_id == employee_id
                && r.status == RequestStatus::Approved
                && matches!(r.kind, RequestKind::Tardiness { date: d, .. } if d == date)
        });
        let classification = classify_check_in(Some(time), has_permission, self.settings());

        let record = match existing {
            Some(idx) => {
                let record = &mut records[idx];
                debug!(
                    "Replacing {} ({}) with a physical check-in",
                    record.record_id, record.status
                );
                record.check_in_time = Some(time);
                record.status = classification.status.clone();
                record.penalties = classification.penalties.clone();
                record.clone()
            }
            None => {
                let mut record = AttendanceRecord::new(
                    new_id("ATT"),
                    employee_id,
                    date,
                    classification.status.clone(),
                    classification.penalties.clone(),
                );
                record.check_in_time = Some(time);
                records.push(record.clone());
                record
            }
        };
        self.save_attendance(&records)?;

        info!(
            "{} checked in at {} on {}: {} (deduction {}%, {})",
            employee_id,
            time.format("%H:%M"),
            date,
            classification.message,
            classification.penalties.wage_deduction,
            classification.deduction_amount(employee.daily_wage)
        );
        Ok(record)
    }

    pub fn check_out(&mut self, employee_id: &str, date: NaiveDate, time: NaiveTime) -> Result<AttendanceRecord> {
        self.find_employee(employee_id)?;
        let mut records = self.attendance()?;
        let not_checked_in = || PolicyError::NotCheckedIn {
            employee_id: employee_id.to_string(),
            date,
        };
        let record = records
            .iter_mut()
            .find(|r| r.employee_id == employee_id && r.date == date)
            .ok_or_else(not_checked_in)?;
        let check_in = record.check_in_time.ok_or_else(not_checked_in)?;
        if let Some(previous) = record.check_out_time {
            return Err(PolicyError::invalid(
                "checkOutTime",
                format!("already checked out at {}", previous.format("%H:%M")),
            ));
        }
        if time < check_in {
            return Err(PolicyError::invalid(
                "checkOutTime",
                format!("{} is before check-in at {}", time.format("%H:%M"), check_in.format("%H:%M")),
            ));
        }
        record.check_out_time = Some(time);
        let updated = record.clone();
        self.save_attendance(&records)?;
        info!("{} checked out at {} on {}", employee_id, time.format("%H:%M"), date);
        Ok(updated)
    }

    /// End-of-day sweep: auto-checkout open records and mark missing workers absent.
    pub fn close_day(&mut self, date: NaiveDate) -> Result<CloseDayReport> {
        let settings = self.settings().clone();
        let employees = self.employees()?;
        let mut records = self.attendance()?;
        let mut report = CloseDayReport {
            date: Some(date),
            ..CloseDayReport::default()
        };

        for record in records
            .iter_mut()
            .filter(|r| r.date == date && r.check_in_time.is_some() && r.check_out_time.is_none())
        {
            record.check_out_time = Some(settings.attendance_rules.auto_checkout_time);
            record.auto_checkout = true;
            record.needs_review = true;
            report.auto_checked_out.push(record.employee_id.clone());
        }

        if settings.is_workday(date) {
            for employee in employees.iter().filter(|e| e.role.is_attendance_tracked()) {
                let has_record = records
                    .iter()
                    .any(|r| r.employee_id == employee.employee_id && r.date == date);
                if has_record {
                    continue;
                }
                let classification = classify_check_in(None, false, &settings);
                records.push(AttendanceRecord::new(
                    new_id("ATT"),
                    &employee.employee_id,
                    date,
                    classification.status,
                    classification.penalties,
                ));
                report.marked_absent.push(employee.employee_id.clone());
            }
        } else {
            debug!("{} is a weekend day; no absences recorded", date);
        }

        if report.auto_checked_out.is_empty() && report.marked_absent.is_empty() {
            debug!("Nothing to close for {}", date);
            return Ok(report);
        }
        self.save_attendance(&records)?;
        if !report.marked_absent.is_empty() {
            warn!(
                "Marked {} employee(s) absent on {}: {}",
                report.marked_absent.len(),
                date,
                report.marked_absent.join(", ")
            );
        }
        info!(
            "Closed {}: {} auto checkout(s), {} absence(s)",
            date,
            report.auto_checked_out.len(),
            report.marked_absent.len()
        );
        Ok(report)
    }

    pub fn attendance_for_day(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        Ok(self.attendance()?.into_iter().filter(|r| r.date == date).collect())
    }
}

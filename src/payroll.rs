// src/payroll.rs
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PolicyError, Result};
use crate::records::{AttendanceStatus, DeductionKind, Role, TaskPriority};
use crate::service::HrService;
use crate::settings::{OvertimePolicy, OvertimeSettings, SystemSettings};
use crate::store::Repository;

const HOURS_PER_DAY: Decimal = dec!(8);
const FIXED_MONTHLY_CAP_PERCENT: Decimal = dec!(40);

// --- Pure Penalty Functions ---

/// Rounds half away from zero to cents.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round2(amount * percent / Decimal::ONE_HUNDRED)
}

/// Two-tier late penalty by minutes late: 10% up to an hour, 20% beyond.
pub fn late_penalty(minutes_late: i64, daily_wage: Decimal) -> Decimal {
    match minutes_late {
        m if m <= 0 => Decimal::ZERO,
        1..=60 => percent_of(daily_wage, dec!(10)),
        _ => percent_of(daily_wage, dec!(20)),
    }
}

pub fn absence_penalty(daily_wage: Decimal) -> Decimal {
    daily_wage
}

/// Request-driven task penalty. Distinct from the overdue sweep's settings table.
pub fn task_penalty(priority: TaskPriority, daily_wage: Decimal) -> Decimal {
    match priority {
        TaskPriority::High => percent_of(daily_wage, dec!(30)),
        TaskPriority::Medium => percent_of(daily_wage, dec!(15)),
        _ => Decimal::ZERO,
    }
}

pub fn overtime_pay(hours: Decimal, hourly_rate: Decimal, is_weekend: bool) -> Decimal {
    let multiplier = if is_weekend { dec!(2) } else { dec!(1.5) };
    hours * hourly_rate * multiplier
}

pub fn total_deductions(penalties: &[Decimal]) -> Decimal {
    penalties.iter().copied().sum()
}

pub fn apply_monthly_cap(total: Decimal, monthly_salary: Decimal) -> Decimal {
    apply_cap_percent(total, monthly_salary, FIXED_MONTHLY_CAP_PERCENT)
}

pub fn apply_cap_percent(total: Decimal, monthly_salary: Decimal, cap_percent: Decimal) -> Decimal {
    let cap = monthly_salary * cap_percent / Decimal::ONE_HUNDRED;
    total.min(cap)
}

pub fn hourly_rate(daily_wage: Decimal) -> Decimal {
    daily_wage / HOURS_PER_DAY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OvertimePay {
    pub hours: Decimal,
    pub amount: Decimal,
    /// Hours credited as time off instead of pay.
    pub banked_hours: Decimal,
}

pub fn overtime_pay_with(
    hours: Decimal,
    hourly_rate: Decimal,
    is_weekend: bool,
    overtime: &OvertimeSettings,
) -> OvertimePay {
    match overtime.policy {
        OvertimePolicy::TimeOff => OvertimePay {
            hours,
            amount: Decimal::ZERO,
            banked_hours: hours,
        },
        OvertimePolicy::Pay => {
            let multiplier = if is_weekend {
                overtime.weekend_multiplier
            } else {
                overtime.weekday_multiplier
            };
            OvertimePay {
                hours,
                amount: round2(hours * hourly_rate * multiplier),
                banked_hours: Decimal::ZERO,
            }
        }
    }
}

// --- Ideal Employee ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentSummary {
    pub employee_id: String,
    pub name: String,
    pub late_days: u32,
    pub absences: u32,
}

impl IncidentSummary {
    pub fn incidents(&self) -> u32 {
        self.late_days + self.absences
    }
}

/// Fewest late days plus absences; the earliest entry wins a tie.
pub fn determine_ideal_employee(summaries: &[IncidentSummary]) -> Option<&IncidentSummary> {
    summaries.iter().min_by_key(|s| s.incidents())
}

// --- Calendar helpers ---

pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| PolicyError::invalid("month", format!("{}-{:02} is not a month", year, month)))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| PolicyError::invalid("month", "date out of range"))?;
    let last = next.pred_opt().unwrap_or(first);
    Ok((first, last))
}

pub fn in_month(date: NaiveDate, year: i32, month: u32) -> bool {
    date.year() == year && date.month() == month
}

pub fn workdays_in_month(year: i32, month: u32, settings: &SystemSettings) -> Result<u32> {
    let (first, last) = month_bounds(year, month)?;
    Ok(first
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| settings.is_workday(*day))
        .count() as u32)
}

pub fn monthly_salary(daily_wage: Decimal, year: i32, month: u32, settings: &SystemSettings) -> Result<Decimal> {
    Ok(daily_wage * Decimal::from(workdays_in_month(year, month, settings)?))
}

// --- Monthly Statement ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    pub kind: DeductionKind,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStatement {
    pub employee_id: String,
    pub year: i32,
    pub month: u32,
    pub workdays: u32,
    pub gross_salary: Decimal,
    pub deductions: Vec<StatementLine>,
    pub uncapped_total: Decimal,
    pub cap: Decimal,
    pub capped_total: Decimal,
    pub overtime: Vec<OvertimePay>,
    pub overtime_pay: Decimal,
    pub banked_hours: Decimal,
    pub net_pay: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdealEmployee {
    pub summary: IncidentSummary,
    pub bonus: Decimal,
}

impl<R: Repository> HrService<R> {
    /// Gross pay, deductions (capped once here) and overtime for one employee and month.
    pub fn monthly_statement(&self, employee_id: &str, year: i32, month: u32) -> Result<MonthlyStatement> {
        let employee = self.find_employee(employee_id)?;
        let settings = self.settings();
        let workdays = workdays_in_month(year, month, settings)?;
        let gross_salary = employee.daily_wage * Decimal::from(workdays);
        let rate = hourly_rate(employee.daily_wage);

        let mut deductions = Vec::new();
        let mut overtime = Vec::new();
        let mut records: Vec<_> = self
            .attendance()?
            .into_iter()
            .filter(|r| r.employee_id == employee_id && in_month(r.date, year, month))
            .collect();
        records.sort_by_key(|r| r.date);

        for record in &records {
            if record.penalties.wage_deduction > Decimal::ZERO {
                let kind = match record.status {
                    AttendanceStatus::Late { .. } => DeductionKind::LateArrival,
                    AttendanceStatus::Absent | AttendanceStatus::UnauthorizedAbsence => DeductionKind::Absence,
                    _ => DeductionKind::Other,
                };
                deductions.push(StatementLine {
                    kind,
                    date: record.date,
                    amount: percent_of(employee.daily_wage, record.penalties.wage_deduction),
                    description: format!("{} ({}% of daily wage)", record.status, record.penalties.wage_deduction),
                });
            }
            if record.approved_overtime {
                if let Some(hours) = record.overtime_hours {
                    overtime.push(overtime_pay_with(
                        hours,
                        rate,
                        settings.is_weekend(record.date),
                        &settings.overtime,
                    ));
                }
            }
        }

        for ledger in self.payroll()?.into_iter().filter(|p| p.employee_id == employee_id) {
            for deduction in ledger.deductions {
                if in_month(deduction.date, year, month) {
                    deductions.push(StatementLine {
                        kind: deduction.kind,
                        date: deduction.date,
                        amount: deduction.amount,
                        description: deduction.description,
                    });
                }
            }
        }

        let amounts: Vec<Decimal> = deductions.iter().map(|line| line.amount).collect();
        let uncapped_total = total_deductions(&amounts);
        let cap = round2(gross_salary * settings.deduction_cap_percent / Decimal::ONE_HUNDRED);
        let capped_total = apply_cap_percent(uncapped_total, gross_salary, settings.deduction_cap_percent);
        let overtime_pay: Decimal = overtime.iter().map(|o| o.amount).sum();
        let banked_hours: Decimal = overtime.iter().map(|o| o.banked_hours).sum();
        let net_pay = round2(gross_salary - capped_total + overtime_pay);

        debug!(
            "Statement {} {}-{:02}: gross {}, deductions {} (capped {}), overtime {}",
            employee_id, year, month, gross_salary, uncapped_total, capped_total, overtime_pay
        );

        Ok(MonthlyStatement {
            employee_id: employee_id.to_string(),
            year,
            month,
            workdays,
            gross_salary,
            deductions,
            uncapped_total,
            cap,
            capped_total: round2(capped_total),
            overtime,
            overtime_pay,
            banked_hours,
            net_pay,
        })
    }

    /// Late days and absences per attendance-tracked employee, in employee order.
    pub fn incident_summaries(&self, year: i32, month: u32) -> Result<Vec<IncidentSummary>> {
        month_bounds(year, month)?;
        let attendance = self.attendance()?;
        Ok(self
            .employees()?
            .into_iter()
            .filter(|e| e.role.is_attendance_tracked())
            .map(|e| {
                let mut summary = IncidentSummary {
                    employee_id: e.employee_id.clone(),
                    name: e.name.clone(),
                    late_days: 0,
                    absences: 0,
                };
                for record in attendance
                    .iter()
                    .filter(|r| r.employee_id == e.employee_id && in_month(r.date, year, month))
                {
                    if record.status.is_late() {
                        summary.late_days += 1;
                    } else if record.status.is_absence_incident() {
                        summary.absences += 1;
                    }
                }
                summary
            })
            .collect())
    }

    pub fn ideal_employee(&self, year: i32, month: u32) -> Result<Option<IdealEmployee>> {
        let summaries = self.incident_summaries(year, month)?;
        let Some(winner) = determine_ideal_employee(&summaries) else {
            return Ok(None);
        };
        let employee = self.find_employee(&winner.employee_id)?;
        let gross = monthly_salary(employee.daily_wage, year, month, self.settings())?;
        let bonus = percent_of(gross, self.settings().ideal_employee_bonus_percent);
        info!(
            "Ideal employee for {}-{:02}: {} with {} incident(s), bonus {}",
            year,
            month,
            winner.employee_id,
            winner.incidents(),
            bonus
        );
        Ok(Some(IdealEmployee {
            summary: winner.clone(),
            bonus,
        }))
    }

    /// Employees the payroll view lists (everyone but security staff).
    pub fn payroll_roster(&self) -> Result<Vec<String>> {
        Ok(self
            .employees()?
            .into_iter()
            .filter(|e| e.role != Role::Security)
            .map(|e| e.employee_id)
            .collect())
    }
}

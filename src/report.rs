// src/report.rs
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{PolicyError, Result};
use crate::records::{AttendanceStatus, RequestStatus, Task, TaskStatus};
use crate::service::HrService;
use crate::store::Repository;

// --- Team Day Summary ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDaySummary {
    pub manager_id: String,
    pub date: Option<NaiveDate>,
    pub team_size: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub work_from_home: usize,
    pub on_leave: usize,
    pub not_checked_in: usize,
    pub needs_review: Vec<String>,
}

// --- HR Report ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HrReport {
    pub date: Option<NaiveDate>,
    pub headcount: usize,
    pub departments: BTreeMap<String, usize>,
    pub attendance_today: BTreeMap<String, usize>,
    pub requests_by_status: BTreeMap<String, usize>,
    pub tasks_by_status: BTreeMap<String, usize>,
    pub overdue_tasks: usize,
    pub pending_tasks: Vec<Task>,
}

impl<R: Repository> HrService<R> {
    /// Attendance counts for a manager's direct reports on one day.
    pub fn team_day_summary(&self, manager_employee_id: &str, date: NaiveDate) -> Result<TeamDaySummary> {
        let employees = self.employees()?;
        let manager = employees
            .iter()
            .find(|e| e.employee_id == manager_employee_id)
            .ok_or_else(|| PolicyError::employee_not_found(manager_employee_id))?;
        let team: Vec<_> = employees
            .iter()
            .filter(|e| e.manager_id == Some(manager.id))
            .collect();
        let records = self.attendance_for_day(date)?;

        let mut summary = TeamDaySummary {
            manager_id: manager_employee_id.to_string(),
            date: Some(date),
            team_size: team.len(),
            ..TeamDaySummary::default()
        };
        for member in &team {
            let Some(record) = records.iter().find(|r| r.employee_id == member.employee_id) else {
                summary.not_checked_in += 1;
                continue;
            };
            match record.status {
                AttendanceStatus::OnTime | AttendanceStatus::Present { .. } => summary.present += 1,
                AttendanceStatus::Late { .. } => summary.late += 1,
                AttendanceStatus::Absent | AttendanceStatus::UnauthorizedAbsence => summary.absent += 1,
                AttendanceStatus::WorkFromHome => summary.work_from_home += 1,
                AttendanceStatus::ApprovedAbsence => summary.on_leave += 1,
            }
            if record.needs_review {
                summary.needs_review.push(member.employee_id.clone());
            }
        }
        debug!("Team summary for {} on {}: {:?}", manager_employee_id, date, summary);
        Ok(summary)
    }

    /// Organisation-wide counts for the HR dashboard.
    pub fn hr_report(&self, today: NaiveDate) -> Result<HrReport> {
        let employees = self.employees()?;
        let mut report = HrReport {
            date: Some(today),
            headcount: employees.len(),
            ..HrReport::default()
        };

        for employee in &employees {
            let department = if employee.department.trim().is_empty() {
                "Unassigned".to_string()
            } else {
                employee.department.clone()
            };
            *report.departments.entry(department).or_default() += 1;
        }
        for record in self.attendance_for_day(today)? {
            *report
                .attendance_today
                .entry(record.status.label().to_string())
                .or_default() += 1;
        }
        for request in self.requests()? {
            *report
                .requests_by_status
                .entry(request.status.to_string())
                .or_default() += 1;
        }
        for status in [RequestStatus::Pending, RequestStatus::Approved, RequestStatus::Rejected] {
            report.requests_by_status.entry(status.to_string()).or_default();
        }

        for task in self.tasks()? {
            *report.tasks_by_status.entry(task.status.to_string()).or_default() += 1;
            if task.status != TaskStatus::Done {
                if task.due_date < today {
                    report.overdue_tasks += 1;
                }
                report.pending_tasks.push(task);
            }
        }
        report.pending_tasks.sort_by_key(|t| t.due_date);
        Ok(report)
    }
}

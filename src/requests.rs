// src/requests.rs
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PolicyError, Result};
use crate::records::{
    AttendanceRecord, AttendanceStatus, Employee, Penalties, Request, RequestKind, RequestStatus,
    RequestType, Role, Task,
};
use crate::service::{new_id, HrService};
use crate::store::{self, Collection, Repository};

const MAX_OVERTIME_HOURS_PER_REQUEST: Decimal = dec!(8);

// --- Quota ---

/// Monthly cap per request type: a count of approved requests, or summed hours for overtime.
pub fn quota_limit(request_type: RequestType) -> Option<Decimal> {
    match request_type {
        RequestType::Tardiness => Some(dec!(2)),
        RequestType::Absence => Some(dec!(3)),
        RequestType::WorkFromHome => Some(dec!(5)),
        RequestType::Overtime => Some(dec!(20)),
        RequestType::DeadlineExtension => None,
    }
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Quota consumed by `employee_id`'s approved requests of one type submitted in `month`'s calendar month.
pub fn quota_used(
    employee_id: &str,
    request_type: RequestType,
    month: NaiveDate,
    existing: &[Request],
) -> Decimal {
    existing
        .iter()
        .filter(|r| {
            r.employee_id == employee_id
                && r.status == RequestStatus::Approved
                && r.request_type() == request_type
                && same_month(r.submitted_date, month)
        })
        .map(|r| match &r.kind {
            RequestKind::Overtime { hours, .. } => *hours,
            _ => Decimal::ONE,
        })
        .sum()
}

/// Pure quota check for a new submission. Over quota is `QuotaExceeded`.
pub fn check_quota(
    employee_id: &str,
    kind: &RequestKind,
    submitted: NaiveDate,
    existing: &[Request],
) -> Result<()> {
    let request_type = kind.request_type();
    let Some(limit) = quota_limit(request_type) else {
        return Ok(());
    };
    let used = quota_used(employee_id, request_type, submitted, existing);
    let within = match kind {
        RequestKind::Overtime { hours, .. } => used + *hours <= limit,
        _ => used < limit,
    };
    if within {
        Ok(())
    } else {
        Err(PolicyError::QuotaExceeded {
            request_type,
            used,
            limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub request_type: RequestType,
    pub used: Decimal,
    pub limit: Option<Decimal>,
}

// --- Submission & decisions ---

#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub employee_id: String,
    pub kind: RequestKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject { reason: Option<String> },
}

/// What a decision changed outside the request itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "camelCase")]
pub enum DecisionEffect {
    None,
    AttendanceCreated { record_id: String },
    AttendanceUpdated { record_id: String },
    TaskRescheduled { task_id: String, due_date: NaiveDate },
    Skipped { reason: String },
}

fn validate_kind(kind: &RequestKind) -> Result<()> {
    match kind {
        RequestKind::Absence { start_date, end_date } if end_date < start_date => Err(PolicyError::invalid(
            "endDate",
            format!("{} is before start date {}", end_date, start_date),
        )),
        RequestKind::Overtime { hours, .. } if *hours <= Decimal::ZERO || *hours > MAX_OVERTIME_HOURS_PER_REQUEST => {
            Err(PolicyError::invalid(
                "hours",
                format!("must be more than 0 and at most {} (got {})", MAX_OVERTIME_HOURS_PER_REQUEST, hours),
            ))
        }
        RequestKind::DeadlineExtension {
            task_name,
            task_id,
            current_deadline,
            requested_deadline,
        } => {
            if task_name.trim().is_empty() && task_id.is_none() {
                return Err(PolicyError::missing("taskName"));
            }
            if requested_deadline <= current_deadline {
                return Err(PolicyError::invalid(
                    "requestedDeadline",
                    format!("{} is not after the current deadline {}", requested_deadline, current_deadline),
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn find_for_date(records: &[AttendanceRecord], employee_id: &str, date: NaiveDate) -> Option<usize> {
    records
        .iter()
        .position(|r| r.employee_id == employee_id && r.date == date)
}

fn upsert_status(
    records: &mut Vec<AttendanceRecord>,
    employee_id: &str,
    date: NaiveDate,
    status: AttendanceStatus,
    penalties: Penalties,
) -> DecisionEffect {
    match find_for_date(records, employee_id, date) {
        Some(idx) => {
            let record = &mut records[idx];
            record.status = status;
            record.penalties = penalties;
            DecisionEffect::AttendanceUpdated {
                record_id: record.record_id.clone(),
            }
        }
        None => {
            let record = AttendanceRecord::new(new_id("ATT"), employee_id, date, status, penalties);
            let record_id = record.record_id.clone();
            records.push(record);
            DecisionEffect::AttendanceCreated { record_id }
        }
    }
}

/// Applies the attendance and task consequences of a freshly recorded decision.
/// Must run exactly once per decision; the terminal status guards re-entry.
pub fn apply_decision_effects(
    request: &Request,
    attendance: &mut Vec<AttendanceRecord>,
    tasks: &mut [Task],
) -> DecisionEffect {
    let employee_id = request.employee_id.as_str();
    match (&request.kind, request.status) {
        (RequestKind::Tardiness { date, .. }, RequestStatus::Approved) => {
            match find_for_date(attendance, employee_id, *date) {
                Some(idx) if attendance[idx].status.is_late() => {
                    let record = &mut attendance[idx];
                    record.status = AttendanceStatus::Present {
                        late_permission: false,
                        tardiness_waived: true,
                    };
                    record.penalties.wage_deduction = Decimal::ZERO;
                    DecisionEffect::AttendanceUpdated {
                        record_id: record.record_id.clone(),
                    }
                }
                _ => DecisionEffect::None,
            }
        }
        (RequestKind::WorkFromHome { date }, RequestStatus::Approved) => {
            let penalties = find_for_date(attendance, employee_id, *date)
                .map(|idx| Penalties {
                    wage_deduction: Decimal::ZERO,
                    ..attendance[idx].penalties.clone()
                })
                .unwrap_or_default();
            upsert_status(attendance, employee_id, *date, AttendanceStatus::WorkFromHome, penalties)
        }
        (RequestKind::Absence { start_date, .. }, RequestStatus::Approved) => upsert_status(
            attendance,
            employee_id,
            *start_date,
            AttendanceStatus::ApprovedAbsence,
            Penalties::none(),
        ),
        (RequestKind::Absence { start_date, .. }, RequestStatus::Rejected) => {
            let applies = match find_for_date(attendance, employee_id, *start_date) {
                None => true,
                Some(idx) => attendance[idx].status == AttendanceStatus::Absent,
            };
            if applies {
                upsert_status(
                    attendance,
                    employee_id,
                    *start_date,
                    AttendanceStatus::UnauthorizedAbsence,
                    Penalties::full_day(),
                )
            } else {
                DecisionEffect::None
            }
        }
        (RequestKind::Overtime { date, hours }, RequestStatus::Approved) => {
            match find_for_date(attendance, employee_id, *date) {
                Some(idx) => {
                    let record = &mut attendance[idx];
                    record.overtime_hours = Some(*hours);
                    record.approved_overtime = true;
                    DecisionEffect::AttendanceUpdated {
                        record_id: record.record_id.clone(),
                    }
                }
                None => {
                    warn!(
                        "Approved overtime for {} on {} has no attendance record to annotate",
                        employee_id, date
                    );
                    DecisionEffect::Skipped {
                        reason: format!("no attendance record on {}", date),
                    }
                }
            }
        }
        (
            RequestKind::DeadlineExtension {
                task_id: Some(task_id),
                requested_deadline,
                ..
            },
            RequestStatus::Approved,
        ) => match tasks.iter_mut().find(|t| &t.task_id == task_id) {
            Some(task) => {
                task.due_date = *requested_deadline;
                task.extension_approved = true;
                DecisionEffect::TaskRescheduled {
                    task_id: task_id.clone(),
                    due_date: *requested_deadline,
                }
            }
            None => {
                warn!("Deadline extension {} refers to missing task {}", request.request_id, task_id);
                DecisionEffect::Skipped {
                    reason: format!("task {} not found", task_id),
                }
            }
        },
        _ => DecisionEffect::None,
    }
}

fn may_decide(actor: &Employee, request: &Request) -> bool {
    matches!(actor.role, Role::Hr | Role::Admin)
        || request.manager_id.as_deref() == Some(actor.employee_id.as_str())
}

impl<R: Repository> HrService<R> {
    pub fn submit_request(&mut self, new: NewRequest, today: NaiveDate) -> Result<Request> {
        if new.reason.trim().is_empty() {
            return Err(PolicyError::missing("reason"));
        }
        validate_kind(&new.kind)?;
        let employees = self.employees()?;
        let employee = employees
            .iter()
            .find(|e| e.employee_id == new.employee_id)
            .ok_or_else(|| PolicyError::employee_not_found(&new.employee_id))?;
        let manager_id = employee.manager_id.and_then(|mid| {
            let manager = employees.iter().find(|m| m.id == mid);
            if manager.is_none() {
                warn!("{} references unknown manager id {}", employee.employee_id, mid);
            }
            manager.map(|m| m.employee_id.clone())
        });

        let mut requests = self.requests()?;
        if let Err(e) = check_quota(&new.employee_id, &new.kind, today, &requests) {
            warn!("Rejected submission from {}: {}", new.employee_id, e);
            return Err(e);
        }

        let request = Request {
            request_id: new_id("REQ"),
            employee_id: new.employee_id,
            manager_id,
            kind: new.kind,
            reason: new.reason.trim().to_string(),
            status: RequestStatus::Pending,
            submitted_date: today,
            processed_date: None,
            rejection_reason: None,
        };
        requests.push(request.clone());
        self.save_requests(&requests)?;
        info!(
            "{} submitted {} request {} (manager: {})",
            request.employee_id,
            request.request_type(),
            request.request_id,
            request.manager_id.as_deref().unwrap_or("none")
        );
        Ok(request)
    }

    /// Records a decision and applies its side effects once. Only the request's
    /// manager, HR or Admin may decide.
    pub fn decide_request(
        &mut self,
        actor: &Employee,
        request_id: &str,
        decision: Decision,
        today: NaiveDate,
    ) -> Result<(Request, DecisionEffect)> {
        let mut requests = self.requests()?;
        let request = requests
            .iter_mut()
            .find(|r| r.request_id == request_id)
            .ok_or_else(|| PolicyError::RequestNotFound {
                request_id: request_id.to_string(),
            })?;
        if !may_decide(actor, request) {
            return Err(PolicyError::Unauthorized {
                role: actor.role,
                action: format!("decide request {}", request_id),
            });
        }
        if request.status != RequestStatus::Pending {
            return Err(PolicyError::RequestAlreadyDecided {
                request_id: request_id.to_string(),
                status: request.status,
            });
        }

        match decision {
            Decision::Approve => request.status = RequestStatus::Approved,
            Decision::Reject { reason } => {
                request.status = RequestStatus::Rejected;
                request.rejection_reason = reason.filter(|r| !r.trim().is_empty());
            }
        }
        request.processed_date = Some(today);
        let decided = request.clone();

        let mut attendance = self.attendance()?;
        let mut tasks = self.tasks()?;
        let effect = apply_decision_effects(&decided, &mut attendance, &mut tasks);
        // Decided status and its effect land together or not at all.
        let mut batch = vec![store::encode(Collection::Requests, &requests)?];
        match &effect {
            DecisionEffect::AttendanceCreated { .. } | DecisionEffect::AttendanceUpdated { .. } => {
                batch.push(store::encode(Collection::Attendance, &attendance)?)
            }
            DecisionEffect::TaskRescheduled { .. } => batch.push(store::encode(Collection::Tasks, &tasks)?),
            DecisionEffect::None | DecisionEffect::Skipped { .. } => {}
        }
        self.commit(batch)?;

        info!(
            "{} {} {} request {} ({:?})",
            actor.employee_id,
            decided.status.to_string().to_lowercase(),
            decided.request_type(),
            request_id,
            effect
        );
        Ok((decided, effect))
    }

    /// Removes a request that has not been decided yet.
    pub fn delete_request(&mut self, request_id: &str) -> Result<Request> {
        let mut requests = self.requests()?;
        let idx = requests
            .iter()
            .position(|r| r.request_id == request_id)
            .ok_or_else(|| PolicyError::RequestNotFound {
                request_id: request_id.to_string(),
            })?;
        if requests[idx].status != RequestStatus::Pending {
            return Err(PolicyError::RequestNotPending {
                request_id: request_id.to_string(),
                status: requests[idx].status,
            });
        }
        let removed = requests.remove(idx);
        self.save_requests(&requests)?;
        info!("Deleted pending request {}", request_id);
        Ok(removed)
    }

    /// Used/limit per request type for the calendar month containing `month`.
    pub fn quota_usage(&self, employee_id: &str, month: NaiveDate) -> Result<Vec<QuotaUsage>> {
        self.find_employee(employee_id)?;
        let requests = self.requests()?;
        Ok([
            RequestType::Tardiness,
            RequestType::Absence,
            RequestType::WorkFromHome,
            RequestType::Overtime,
            RequestType::DeadlineExtension,
        ]
        .into_iter()
        .map(|request_type| QuotaUsage {
            request_type,
            used: quota_used(employee_id, request_type, month, &requests),
            limit: quota_limit(request_type),
        })
        .collect())
    }

    /// Pending requests routed to this manager, oldest first.
    pub fn pending_for_manager(&self, manager_employee_id: &str) -> Result<Vec<Request>> {
        let mut pending: Vec<Request> = self
            .requests()?
            .into_iter()
            .filter(|r| {
                r.status == RequestStatus::Pending && r.manager_id.as_deref() == Some(manager_employee_id)
            })
            .collect();
        pending.sort_by_key(|r| r.submitted_date);
        debug!("{} pending request(s) for {}", pending.len(), manager_employee_id);
        Ok(pending)
    }

    pub fn requests_for_employee(&self, employee_id: &str) -> Result<Vec<Request>> {
        Ok(self
            .requests()?
            .into_iter()
            .filter(|r| r.employee_id == employee_id)
            .collect())
    }
}

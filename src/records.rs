// src/records.rs
//! Record types persisted in the blob store.
//!
//! Statuses and request payloads are closed tagged unions: each variant only
//! carries the fields that are valid for it. The JSON shape (camelCase keys,
//! human-readable status labels) matches the documents the store already holds.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

/// `HH:MM` (de)serialisation for times of day. Seconds are accepted on input.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {}", raw)))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid time of day: {}", raw))
                }),
            }
        }
    }
}

// --- Employees ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(alias = "employee")]
    Employee,
    #[serde(alias = "manager")]
    Manager,
    #[serde(rename = "HR", alias = "hr")]
    Hr,
    #[serde(alias = "admin")]
    Admin,
    #[serde(alias = "security")]
    Security,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Employee => "Employee",
            Role::Manager => "Manager",
            Role::Hr => "HR",
            Role::Admin => "Admin",
            Role::Security => "Security",
        };
        f.write_str(label)
    }
}

impl Role {
    /// Roles whose attendance is tracked by the end-of-day absence sweep.
    pub fn is_attendance_tracked(self) -> bool {
        matches!(self, Role::Employee | Role::Manager)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: u32,
    pub employee_id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Legacy plaintext credential; accepted on input so it can be hashed, never written back.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<u32>,
    #[serde(default, alias = "dailyPay")]
    pub daily_wage: Decimal,
}

// --- Attendance ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum AttendanceStatus {
    #[serde(rename = "On-Time")]
    OnTime,
    #[serde(rename_all = "camelCase")]
    Present {
        #[serde(default, skip_serializing_if = "is_false")]
        late_permission: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        tardiness_waived: bool,
    },
    #[serde(rename_all = "camelCase")]
    Late {
        #[serde(default)]
        minutes_late: u32,
    },
    Absent,
    #[serde(rename = "Present (WFH)")]
    WorkFromHome,
    #[serde(rename = "Approved Absence")]
    ApprovedAbsence,
    #[serde(rename = "Absent (Unauthorized)")]
    UnauthorizedAbsence,
}

impl AttendanceStatus {
    pub fn present() -> Self {
        AttendanceStatus::Present {
            late_permission: false,
            tardiness_waived: false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "On-Time",
            AttendanceStatus::Present { .. } => "Present",
            AttendanceStatus::Late { .. } => "Late",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::WorkFromHome => "Present (WFH)",
            AttendanceStatus::ApprovedAbsence => "Approved Absence",
            AttendanceStatus::UnauthorizedAbsence => "Absent (Unauthorized)",
        }
    }

    pub fn is_late(&self) -> bool {
        matches!(self, AttendanceStatus::Late { .. })
    }

    /// Absences that count as incidents (approved leave does not).
    pub fn is_absence_incident(&self) -> bool {
        matches!(
            self,
            AttendanceStatus::Absent | AttendanceStatus::UnauthorizedAbsence
        )
    }

    pub fn is_present(&self) -> bool {
        matches!(
            self,
            AttendanceStatus::OnTime
                | AttendanceStatus::Present { .. }
                | AttendanceStatus::WorkFromHome
        )
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalties {
    /// Percent of the daily wage, 0-100. Stored uncapped.
    #[serde(default)]
    pub wage_deduction: Decimal,
    #[serde(default)]
    pub vacation_day_deducted: bool,
}

impl Penalties {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn full_day() -> Self {
        Self {
            wage_deduction: Decimal::ONE_HUNDRED,
            vacation_day_deducted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub record_id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    #[serde(default, with = "hhmm::option")]
    pub check_in_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub check_out_time: Option<NaiveTime>,
    #[serde(flatten)]
    pub status: AttendanceStatus,
    #[serde(default)]
    pub penalties: Penalties,
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_checkout: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub needs_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overtime_hours: Option<Decimal>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub approved_overtime: bool,
}

impl AttendanceRecord {
    pub fn new(
        record_id: String,
        employee_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        penalties: Penalties,
    ) -> Self {
        Self {
            record_id,
            employee_id: employee_id.to_string(),
            date,
            check_in_time: None,
            check_out_time: None,
            status,
            penalties,
            auto_checkout: false,
            needs_review: false,
            overtime_hours: None,
            approved_overtime: false,
        }
    }
}

// --- Requests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Tardiness,
    Absence,
    #[serde(rename = "Work from Home")]
    WorkFromHome,
    Overtime,
    #[serde(rename = "Deadline Extension")]
    DeadlineExtension,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestType::Tardiness => "Tardiness",
            RequestType::Absence => "Absence",
            RequestType::WorkFromHome => "Work from Home",
            RequestType::Overtime => "Overtime",
            RequestType::DeadlineExtension => "Deadline Extension",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "requestType")]
pub enum RequestKind {
    #[serde(rename_all = "camelCase")]
    Tardiness {
        date: NaiveDate,
        #[serde(default, with = "hhmm::option", skip_serializing_if = "Option::is_none")]
        expected_time: Option<NaiveTime>,
    },
    #[serde(rename_all = "camelCase")]
    Absence {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    #[serde(rename = "Work from Home", rename_all = "camelCase")]
    WorkFromHome { date: NaiveDate },
    #[serde(rename_all = "camelCase")]
    Overtime { date: NaiveDate, hours: Decimal },
    #[serde(rename = "Deadline Extension", rename_all = "camelCase")]
    DeadlineExtension {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
        #[serde(default)]
        task_name: String,
        current_deadline: NaiveDate,
        requested_deadline: NaiveDate,
    },
}

impl RequestKind {
    pub fn request_type(&self) -> RequestType {
        match self {
            RequestKind::Tardiness { .. } => RequestType::Tardiness,
            RequestKind::Absence { .. } => RequestType::Absence,
            RequestKind::WorkFromHome { .. } => RequestType::WorkFromHome,
            RequestKind::Overtime { .. } => RequestType::Overtime,
            RequestKind::DeadlineExtension { .. } => RequestType::DeadlineExtension,
        }
    }

    /// The attendance date the request is about.
    pub fn primary_date(&self) -> NaiveDate {
        match self {
            RequestKind::Tardiness { date, .. }
            | RequestKind::WorkFromHome { date }
            | RequestKind::Overtime { date, .. } => *date,
            RequestKind::Absence { start_date, .. } => *start_date,
            RequestKind::DeadlineExtension {
                current_deadline, ..
            } => *current_deadline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "approved")]
    Approved,
    #[serde(alias = "rejected")]
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_id: String,
    pub employee_id: String,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(flatten)]
    pub kind: RequestKind,
    #[serde(default)]
    pub reason: String,
    pub status: RequestStatus,
    pub submitted_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl Request {
    pub fn request_type(&self) -> RequestType {
        self.kind.request_type()
    }
}

// --- Tasks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
            TaskPriority::Critical => "Critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "To-Do")]
    ToDo,
    #[serde(rename = "In-Progress")]
    InProgress,
    Done,
}

impl TaskStatus {
    /// The only status a task may move to next.
    pub fn next(self) -> Option<TaskStatus> {
        match self {
            TaskStatus::ToDo => Some(TaskStatus::InProgress),
            TaskStatus::InProgress => Some(TaskStatus::Done),
            TaskStatus::Done => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::ToDo => "To-Do",
            TaskStatus::InProgress => "In-Progress",
            TaskStatus::Done => "Done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskComment {
    pub author: String,
    pub text: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPenalty {
    pub amount: Decimal,
    pub percent: Decimal,
    pub applied_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub assigned_to: String,
    pub assigned_by: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<TaskComment>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub extension_approved: bool,
    /// Set once by the overdue sweep; never overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty: Option<TaskPenalty>,
}

// --- Payroll ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeductionKind {
    #[serde(rename = "Late Arrival")]
    LateArrival,
    Absence,
    #[serde(rename = "Task Overdue")]
    TaskOverdue,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deduction {
    #[serde(rename = "type")]
    pub kind: DeductionKind,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    pub employee_id: String,
    #[serde(default)]
    pub deductions: Vec<Deduction>,
}

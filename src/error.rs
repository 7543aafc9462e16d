// src/error.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::records::{RequestStatus, RequestType, Role, TaskStatus};

pub type Result<T, E = PolicyError> = std::result::Result<T, E>;

/// Coarse classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
    Authorization,
}

// --- Storage Errors ---

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization failed: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("Collection '{collection}' holds malformed data: {detail}")]
    Malformed { collection: String, detail: String },
}

// --- Authentication Errors ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Email address not found")]
    UnknownEmail,
    #[error("Incorrect password")]
    WrongPassword,
    #[error("No credential on file for {employee_id}")]
    MissingCredential { employee_id: String },
    #[error("Stored credential is malformed")]
    MalformedHash,
}

// --- Settings Errors ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{field} must be between 0 and 100 (got {value})")]
    PercentOutOfRange { field: String, value: Decimal },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: String, value: Decimal },
    #[error("Late penalty tiers must be strictly ascending by minutes")]
    UnsortedLateTiers,
    #[error("Attendance thresholds must satisfy work start <= late threshold < absent threshold")]
    ThresholdOrder,
    #[error("Unknown weekday name: {0}")]
    UnknownWeekday(String),
}

// --- Policy Errors ---

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },
    #[error("Invalid value for {field}: {detail}")]
    InvalidField { field: String, detail: String },
    #[error("Invalid email address: {email}")]
    InvalidEmail { email: String },
    #[error("Email address already registered: {email}")]
    DuplicateEmail { email: String },
    #[error("Employee ID already in use: {employee_id}")]
    DuplicateEmployeeId { employee_id: String },
    #[error("Monthly {request_type} quota exceeded ({used}/{limit} used)")]
    QuotaExceeded {
        request_type: RequestType,
        used: Decimal,
        limit: Decimal,
    },
    #[error("{employee_id} has already checked in on {date}")]
    AlreadyCheckedIn { employee_id: String, date: NaiveDate },
    #[error("No check-in recorded for {employee_id} on {date}")]
    NotCheckedIn { employee_id: String, date: NaiveDate },
    #[error("Request {request_id} has already been {status}")]
    RequestAlreadyDecided {
        request_id: String,
        status: RequestStatus,
    },
    #[error("Only pending requests can be deleted; {request_id} is {status}")]
    RequestNotPending {
        request_id: String,
        status: RequestStatus,
    },
    #[error("Task {task_id} cannot move from {from} to {to}")]
    InvalidTaskTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("Employee not found: {employee_id}")]
    EmployeeNotFound { employee_id: String },
    #[error("Request not found: {request_id}")]
    RequestNotFound { request_id: String },
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("Not logged in")]
    NotAuthenticated,
    #[error("Access denied: role {role} may not {action}")]
    Unauthorized { role: Role, action: String },
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl PolicyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::MissingField { .. }
            | PolicyError::InvalidField { .. }
            | PolicyError::InvalidEmail { .. }
            | PolicyError::DuplicateEmail { .. }
            | PolicyError::DuplicateEmployeeId { .. }
            | PolicyError::QuotaExceeded { .. }
            | PolicyError::AlreadyCheckedIn { .. }
            | PolicyError::NotCheckedIn { .. }
            | PolicyError::RequestAlreadyDecided { .. }
            | PolicyError::RequestNotPending { .. }
            | PolicyError::InvalidTaskTransition { .. }
            | PolicyError::InvalidSettings(_) => ErrorKind::Validation,
            PolicyError::EmployeeNotFound { .. }
            | PolicyError::RequestNotFound { .. }
            | PolicyError::TaskNotFound { .. } => ErrorKind::NotFound,
            PolicyError::NotAuthenticated
            | PolicyError::Unauthorized { .. }
            | PolicyError::Auth(_) => ErrorKind::Authorization,
            PolicyError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        PolicyError::MissingField {
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, detail: impl Into<String>) -> Self {
        PolicyError::InvalidField {
            field: field.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn employee_not_found(employee_id: &str) -> Self {
        PolicyError::EmployeeNotFound {
            employee_id: employee_id.to_string(),
        }
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(e: serde_json::Error) -> Self {
        PolicyError::Storage(StoreError::SerdeJson(e))
    }
}

impl From<std::io::Error> for PolicyError {
    fn from(e: std::io::Error) -> Self {
        PolicyError::Storage(StoreError::Io(e))
    }
}

impl From<csv::Error> for PolicyError {
    fn from(e: csv::Error) -> Self {
        PolicyError::Storage(StoreError::Csv(e))
    }
}

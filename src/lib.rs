// src/lib.rs
//! Attendance, request, task and payroll policy engine over a JSON blob store.

pub mod attendance;
pub mod auth;
pub mod config;
pub mod employees;
pub mod error;
pub mod export;
pub mod payroll;
pub mod records;
pub mod report;
pub mod requests;
pub mod service;
pub mod settings;
pub mod store;
pub mod tasks;

#[cfg(test)]
mod attendance_tests;

pub use attendance::{classify_check_in, late_penalty_minutes, Classification, CloseDayReport};
pub use auth::{authenticate, landing_view, LandingView, Session};
pub use config::AppConfig;
pub use employees::{EmployeeUpdate, NewEmployee};
pub use error::{AuthError, ErrorKind, PolicyError, Result, SettingsError, StoreError};
pub use export::{AttendanceFilter, Snapshot};
pub use payroll::{
    absence_penalty, apply_cap_percent, apply_monthly_cap, determine_ideal_employee, late_penalty,
    overtime_pay, overtime_pay_with, task_penalty, total_deductions, IncidentSummary, MonthlyStatement,
};
pub use records::*;
pub use requests::{check_quota, Decision, DecisionEffect, NewRequest, QuotaUsage};
pub use service::HrService;
pub use settings::SystemSettings;
pub use store::{bootstrap, Collection, JsonFileStore, MemoryStore, Repository};
pub use tasks::{NewTask, OverdueCharge};

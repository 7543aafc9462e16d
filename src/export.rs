// src/export.rs
use std::collections::HashMap;
use std::io::Write;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::upgrade_legacy_passwords;
use crate::error::Result;
use crate::records::{AttendanceRecord, Employee, PayrollRecord, Request, Task};
use crate::service::HrService;
use crate::settings::SystemSettings;
use crate::store::{self, Collection, Repository};

/// Every collection plus settings, as one auditor-facing document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub payroll: Vec<PayrollRecord>,
    #[serde(default)]
    pub system_settings: SystemSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceFilter {
    pub employee_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AttendanceFilter {
    fn matches(&self, record: &AttendanceRecord) -> bool {
        self.employee_id.as_deref().map_or(true, |id| record.employee_id == id)
            && self.from.map_or(true, |from| record.date >= from)
            && self.to.map_or(true, |to| record.date <= to)
    }
}

const CSV_HEADER: [&str; 7] = [
    "Employee Name",
    "Employee ID",
    "Date",
    "Check-In",
    "Check-Out",
    "Status",
    "Wage Deduction (%)",
];

fn format_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default()
}

impl<R: Repository> HrService<R> {
    pub fn export_snapshot(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            employees: self.employees()?,
            attendance: self.attendance()?,
            requests: self.requests()?,
            tasks: self.tasks()?,
            payroll: self.payroll()?,
            system_settings: self.settings().clone(),
        };
        info!(
            "Exported snapshot: {} employees, {} attendance, {} requests, {} tasks, {} payroll",
            snapshot.employees.len(),
            snapshot.attendance.len(),
            snapshot.requests.len(),
            snapshot.tasks.len(),
            snapshot.payroll.len()
        );
        Ok(snapshot)
    }

    /// Replaces every collection with the snapshot's contents. Settings are validated first.
    pub fn import_snapshot(&mut self, mut snapshot: Snapshot) -> Result<()> {
        snapshot.system_settings.validate()?;
        let hashed = upgrade_legacy_passwords(&mut snapshot.employees);
        self.commit(vec![
            store::encode(Collection::Employees, &snapshot.employees)?,
            store::encode(Collection::Attendance, &snapshot.attendance)?,
            store::encode(Collection::Requests, &snapshot.requests)?,
            store::encode(Collection::Tasks, &snapshot.tasks)?,
            store::encode(Collection::Payroll, &snapshot.payroll)?,
            (Collection::SystemSettings, serde_json::to_value(&snapshot.system_settings)?),
        ])?;
        self.set_cached_settings(snapshot.system_settings);
        info!(
            "Imported snapshot ({} employees, {} plaintext password(s) hashed)",
            snapshot.employees.len(),
            hashed
        );
        Ok(())
    }

    /// Writes matching attendance rows as CSV, ordered by date then employee. Returns the row count.
    pub fn export_attendance_csv<W: Write>(&self, writer: W, filter: &AttendanceFilter) -> Result<usize> {
        let names: HashMap<String, String> = self
            .employees()?
            .into_iter()
            .map(|e| (e.employee_id, e.name))
            .collect();
        let mut records: Vec<AttendanceRecord> = self
            .attendance()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.employee_id.cmp(&b.employee_id)));

        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(CSV_HEADER)?;
        for record in &records {
            let name = names.get(&record.employee_id).map(String::as_str).unwrap_or("Unknown");
            let date = record.date.to_string();
            let check_in = format_time(record.check_in_time);
            let check_out = format_time(record.check_out_time);
            let deduction = record.penalties.wage_deduction.to_string();
            wtr.write_record([
                name,
                record.employee_id.as_str(),
                date.as_str(),
                check_in.as_str(),
                check_out.as_str(),
                record.status.label(),
                deduction.as_str(),
            ])?;
        }
        wtr.flush()?;
        info!("Exported {} attendance row(s) to CSV", records.len());
        Ok(records.len())
    }
}

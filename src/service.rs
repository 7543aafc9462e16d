// src/service.rs
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use tracing::info;

use crate::error::{PolicyError, Result};
use crate::records::{AttendanceRecord, Employee, PayrollRecord, Request, Task};
use crate::settings::{self, SystemSettings};
use crate::store::{self, Collection, Repository};

/// Policy engine bound to one repository. Settings are loaded once and passed
/// explicitly to the pure policy functions.
pub struct HrService<R: Repository> {
    repo: R,
    settings: SystemSettings,
}

impl<R: Repository> HrService<R> {
    pub fn new(repo: R) -> Result<Self> {
        let settings = settings::load_settings(&repo)?;
        Ok(Self { repo, settings })
    }

    pub fn with_settings(repo: R, settings: SystemSettings) -> Self {
        Self { repo, settings }
    }

    pub fn settings(&self) -> &SystemSettings {
        &self.settings
    }

    /// Validates and stores `new_settings` as a whole-object replacement.
    pub fn update_settings(&mut self, new_settings: SystemSettings) -> Result<()> {
        settings::save_settings(&mut self.repo, &new_settings)?;
        self.settings = new_settings;
        Ok(())
    }

    // Caller has already validated and stored `settings`.
    pub(crate) fn set_cached_settings(&mut self, settings: SystemSettings) {
        self.settings = settings;
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn repo_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn into_repo(self) -> R {
        self.repo
    }

    // --- Collection access ---

    pub fn employees(&self) -> Result<Vec<Employee>> {
        Ok(store::load_all(&self.repo, Collection::Employees)?)
    }

    pub fn attendance(&self) -> Result<Vec<AttendanceRecord>> {
        Ok(store::load_all(&self.repo, Collection::Attendance)?)
    }

    pub fn requests(&self) -> Result<Vec<Request>> {
        Ok(store::load_all(&self.repo, Collection::Requests)?)
    }

    pub fn tasks(&self) -> Result<Vec<Task>> {
        Ok(store::load_all(&self.repo, Collection::Tasks)?)
    }

    pub fn payroll(&self) -> Result<Vec<PayrollRecord>> {
        Ok(store::load_all(&self.repo, Collection::Payroll)?)
    }

    pub(crate) fn save_employees(&mut self, employees: &[Employee]) -> Result<()> {
        Ok(store::save_all(&mut self.repo, Collection::Employees, employees)?)
    }

    pub(crate) fn save_attendance(&mut self, records: &[AttendanceRecord]) -> Result<()> {
        Ok(store::save_all(&mut self.repo, Collection::Attendance, records)?)
    }

    pub(crate) fn save_requests(&mut self, requests: &[Request]) -> Result<()> {
        Ok(store::save_all(&mut self.repo, Collection::Requests, requests)?)
    }

    pub(crate) fn save_tasks(&mut self, tasks: &[Task]) -> Result<()> {
        Ok(store::save_all(&mut self.repo, Collection::Tasks, tasks)?)
    }

    #[cfg(test)]
    pub(crate) fn save_payroll(&mut self, payroll: &[PayrollRecord]) -> Result<()> {
        Ok(store::save_all(&mut self.repo, Collection::Payroll, payroll)?)
    }

    /// Writes several collections as one unit: all of them land or none do.
    pub(crate) fn commit(&mut self, batch: Vec<(Collection, serde_json::Value)>) -> Result<()> {
        Ok(self.repo.put_many(batch)?)
    }

    pub fn find_employee(&self, employee_id: &str) -> Result<Employee> {
        self.employees()?
            .into_iter()
            .find(|e| e.employee_id == employee_id)
            .ok_or_else(|| PolicyError::employee_not_found(employee_id))
    }

    /// Logs in against the stored employees.
    pub fn authenticate(&self, email: &str, secret: &str) -> Result<Employee> {
        let employees = self.employees()?;
        let employee = crate::auth::authenticate(&employees, email, secret)?;
        info!("Authenticated {}", employee.employee_id);
        Ok(employee)
    }
}

/// `PREFIX-XXXXXXXX` with a random alphanumeric suffix.
pub(crate) fn new_id(prefix: &str) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix, suffix.to_uppercase())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::HrService;
    use crate::error::StoreError;
    use crate::records::{Employee, Role};
    use crate::store::{Collection, MemoryStore, Repository};

    pub fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
    }

    pub fn build_employee(
        id: u32,
        employee_id: &str,
        role: Role,
        manager_id: Option<u32>,
        daily_wage: Decimal,
    ) -> Employee {
        Employee {
            id,
            employee_id: employee_id.to_string(),
            name: format!("Name {}", employee_id),
            email: format!("{}@corp.test", employee_id.to_lowercase()),
            password_hash: None,
            password: None,
            role,
            department: if role == Role::Manager || role == Role::Employee {
                "Engineering".to_string()
            } else {
                "Operations".to_string()
            },
            manager_id,
            daily_wage,
        }
    }

    /// Memory store whose writes to one collection fail.
    #[derive(Debug, Default)]
    pub struct FailingStore {
        pub inner: MemoryStore,
        pub fail_on: Option<Collection>,
    }

    impl Repository for FailingStore {
        fn get(&self, collection: Collection) -> std::result::Result<Option<serde_json::Value>, StoreError> {
            self.inner.get(collection)
        }

        fn put(&mut self, collection: Collection, value: serde_json::Value) -> std::result::Result<(), StoreError> {
            if self.fail_on == Some(collection) {
                return Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
            }
            self.inner.put(collection, value)
        }
    }

    /// `seeded_service` over a `FailingStore`; set `fail_on` through `repo_mut`.
    pub fn failing_service() -> HrService<FailingStore> {
        let inner = seeded_service().into_repo();
        HrService::new(FailingStore { inner, fail_on: None }).unwrap()
    }

    /// A manager (MGR001, id 1), two reports (EMP001 id 2, EMP002 id 3), HR (HR001 id 4)
    /// and Security (SEC001 id 5).
    pub fn seeded_service() -> HrService<MemoryStore> {
        use rust_decimal_macros::dec;
        let mut service = HrService::new(MemoryStore::new()).unwrap();
        let staff = vec![
            build_employee(1, "MGR001", Role::Manager, None, dec!(300)),
            build_employee(2, "EMP001", Role::Employee, Some(1), dec!(200)),
            build_employee(3, "EMP002", Role::Employee, Some(1), dec!(160)),
            build_employee(4, "HR001", Role::Hr, None, dec!(250)),
            build_employee(5, "SEC001", Role::Security, None, dec!(120)),
        ];
        service.save_employees(&staff).unwrap();
        service
    }
}

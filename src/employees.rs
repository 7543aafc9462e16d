// src/employees.rs
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::info;

use crate::auth::hash_password;
use crate::error::{PolicyError, Result};
use crate::records::{Employee, Role};
use crate::service::HrService;
use crate::store::Repository;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub employee_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub department: String,
    pub manager_id: Option<u32>,
    pub daily_wage: Decimal,
}

/// Field updates; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub manager_id: Option<Option<u32>>,
    pub daily_wage: Option<Decimal>,
}

pub fn validate_email(email: &str) -> Result<()> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(PolicyError::InvalidEmail {
            email: email.to_string(),
        })
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PolicyError::missing(field));
    }
    Ok(())
}

fn check_wage(daily_wage: Decimal) -> Result<()> {
    if daily_wage < Decimal::ZERO {
        return Err(PolicyError::invalid("dailyWage", format!("must not be negative (got {})", daily_wage)));
    }
    Ok(())
}

fn check_email_unique(employees: &[Employee], email: &str, except: Option<&str>) -> Result<()> {
    let needle = email.trim().to_lowercase();
    let taken = employees
        .iter()
        .filter(|e| Some(e.employee_id.as_str()) != except)
        .any(|e| e.email.trim().to_lowercase() == needle);
    if taken {
        return Err(PolicyError::DuplicateEmail {
            email: email.trim().to_string(),
        });
    }
    Ok(())
}

fn check_manager(employees: &[Employee], manager_id: Option<u32>) -> Result<()> {
    match manager_id {
        Some(mid) if !employees.iter().any(|e| e.id == mid) => Err(PolicyError::invalid(
            "managerId",
            format!("no employee with id {}", mid),
        )),
        _ => Ok(()),
    }
}

impl<R: Repository> HrService<R> {
    pub fn create_employee(&mut self, new: NewEmployee) -> Result<Employee> {
        require_text("name", &new.name)?;
        require_text("email", &new.email)?;
        require_text("employeeId", &new.employee_id)?;
        require_text("password", &new.password)?;
        validate_email(&new.email)?;
        check_wage(new.daily_wage)?;

        let mut employees = self.employees()?;
        check_email_unique(&employees, &new.email, None)?;
        let employee_id = new.employee_id.trim().to_string();
        if employees.iter().any(|e| e.employee_id == employee_id) {
            return Err(PolicyError::DuplicateEmployeeId { employee_id });
        }
        check_manager(&employees, new.manager_id)?;

        let employee = Employee {
            id: employees.iter().map(|e| e.id).max().unwrap_or(0) + 1,
            employee_id,
            name: new.name.trim().to_string(),
            email: new.email.trim().to_string(),
            password_hash: Some(hash_password(&new.password)),
            password: None,
            role: new.role,
            department: new.department.trim().to_string(),
            manager_id: new.manager_id,
            daily_wage: new.daily_wage,
        };
        employees.push(employee.clone());
        self.save_employees(&employees)?;
        info!("Created employee {} ({}, {})", employee.employee_id, employee.name, employee.role);
        Ok(employee)
    }

    pub fn update_employee(&mut self, employee_id: &str, update: EmployeeUpdate) -> Result<Employee> {
        let mut employees = self.employees()?;
        let idx = employees
            .iter()
            .position(|e| e.employee_id == employee_id)
            .ok_or_else(|| PolicyError::employee_not_found(employee_id))?;

        if let Some(name) = &update.name {
            require_text("name", name)?;
        }
        if let Some(email) = &update.email {
            require_text("email", email)?;
            validate_email(email)?;
            check_email_unique(&employees, email, Some(employee_id))?;
        }
        if let Some(wage) = update.daily_wage {
            check_wage(wage)?;
        }
        if let Some(manager_id) = update.manager_id {
            if manager_id == Some(employees[idx].id) {
                return Err(PolicyError::invalid("managerId", "an employee cannot manage themselves"));
            }
            check_manager(&employees, manager_id)?;
        }

        let employee = &mut employees[idx];
        if let Some(name) = update.name {
            employee.name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            employee.email = email.trim().to_string();
        }
        if let Some(role) = update.role {
            employee.role = role;
        }
        if let Some(department) = update.department {
            employee.department = department.trim().to_string();
        }
        if let Some(manager_id) = update.manager_id {
            employee.manager_id = manager_id;
        }
        if let Some(wage) = update.daily_wage {
            employee.daily_wage = wage;
        }
        let updated = employee.clone();
        self.save_employees(&employees)?;
        info!("Updated employee {}", employee_id);
        Ok(updated)
    }

    pub fn set_password(&mut self, employee_id: &str, new_password: &str) -> Result<()> {
        require_text("password", new_password)?;
        let mut employees = self.employees()?;
        let employee = employees
            .iter_mut()
            .find(|e| e.employee_id == employee_id)
            .ok_or_else(|| PolicyError::employee_not_found(employee_id))?;
        employee.password_hash = Some(hash_password(new_password));
        employee.password = None;
        self.save_employees(&employees)?;
        info!("Password changed for {}", employee_id);
        Ok(())
    }
}

// src/tasks.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PolicyError, Result};
use crate::payroll::percent_of;
use crate::records::{
    Deduction, DeductionKind, PayrollRecord, Task, TaskComment, TaskPenalty, TaskPriority, TaskStatus,
};
use crate::service::{new_id, HrService};
use crate::settings::SystemSettings;
use crate::store::{self, Collection, Repository};

#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub assigned_to: String,
    pub assigned_by: String,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueCharge {
    pub task_id: String,
    pub employee_id: String,
    pub amount: Decimal,
    pub percent: Decimal,
}

/// The penalty an overdue task earns today, if any. Done tasks, tasks not yet
/// past due and already-penalised tasks earn none.
pub fn overdue_penalty(
    task: &Task,
    daily_wage: Decimal,
    settings: &SystemSettings,
    today: NaiveDate,
) -> Option<TaskPenalty> {
    if task.status == TaskStatus::Done || task.due_date >= today || task.penalty.is_some() {
        return None;
    }
    let percent = settings.task_penalty_percent(task.priority);
    Some(TaskPenalty {
        amount: percent_of(daily_wage, percent),
        percent,
        applied_date: today,
    })
}

fn task_not_found(task_id: &str) -> PolicyError {
    PolicyError::TaskNotFound {
        task_id: task_id.to_string(),
    }
}

impl<R: Repository> HrService<R> {
    pub fn create_task(&mut self, new: NewTask, today: NaiveDate) -> Result<Task> {
        if new.title.trim().is_empty() {
            return Err(PolicyError::missing("title"));
        }
        if new.assigned_to.trim().is_empty() {
            return Err(PolicyError::missing("assignedTo"));
        }
        let due_date = new.due_date.ok_or_else(|| PolicyError::missing("dueDate"))?;
        self.find_employee(&new.assigned_to)?;

        let task = Task {
            task_id: new_id("TASK"),
            assigned_to: new.assigned_to,
            assigned_by: new.assigned_by,
            title: new.title.trim().to_string(),
            description: new.description,
            priority: new.priority,
            status: TaskStatus::ToDo,
            due_date,
            created_date: Some(today),
            comments: Vec::new(),
            extension_approved: false,
            penalty: None,
        };
        let mut tasks = self.tasks()?;
        tasks.push(task.clone());
        self.save_tasks(&tasks)?;
        info!(
            "Task {} '{}' assigned to {} (due {}, {})",
            task.task_id, task.title, task.assigned_to, task.due_date, task.priority
        );
        Ok(task)
    }

    /// Moves a task one step forward. Any other transition is rejected.
    pub fn advance_task(&mut self, task_id: &str, to: TaskStatus) -> Result<Task> {
        let mut tasks = self.tasks()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| task_not_found(task_id))?;
        if task.status.next() != Some(to) {
            return Err(PolicyError::InvalidTaskTransition {
                task_id: task_id.to_string(),
                from: task.status,
                to,
            });
        }
        let from = task.status;
        task.status = to;
        let updated = task.clone();
        self.save_tasks(&tasks)?;
        info!("Task {} moved {} -> {}", task_id, from, to);
        Ok(updated)
    }

    pub fn add_task_comment(&mut self, task_id: &str, author: &str, text: &str, today: NaiveDate) -> Result<Task> {
        if text.trim().is_empty() {
            return Err(PolicyError::missing("comment"));
        }
        let mut tasks = self.tasks()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| task_not_found(task_id))?;
        task.comments.push(TaskComment {
            author: author.to_string(),
            text: text.trim().to_string(),
            date: today,
        });
        let updated = task.clone();
        self.save_tasks(&tasks)?;
        info!("{} commented on task {}", author, task_id);
        Ok(updated)
    }

    pub fn tasks_for_employee(&self, employee_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .tasks()?
            .into_iter()
            .filter(|t| t.assigned_to == employee_id)
            .collect())
    }

    /// Charges every overdue, unfinished, not-yet-penalised task once and books
    /// the charge on the assignee's payroll ledger.
    pub fn sweep_overdue_tasks(&mut self, today: NaiveDate) -> Result<Vec<OverdueCharge>> {
        let employees = self.employees()?;
        let mut tasks = self.tasks()?;
        let mut payroll = self.payroll()?;
        let mut charges = Vec::new();

        for task in tasks.iter_mut() {
            let Some(employee) = employees.iter().find(|e| e.employee_id == task.assigned_to) else {
                if task.status != TaskStatus::Done && task.due_date < today && task.penalty.is_none() {
                    warn!("Overdue task {} is assigned to unknown employee {}", task.task_id, task.assigned_to);
                }
                continue;
            };
            let Some(penalty) = overdue_penalty(task, employee.daily_wage, self.settings(), today) else {
                continue;
            };

            let deduction = Deduction {
                kind: DeductionKind::TaskOverdue,
                amount: penalty.amount,
                description: format!("Overdue task: {} ({}, {}%)", task.title, task.priority, penalty.percent),
                date: today,
            };
            match payroll.iter_mut().find(|p| p.employee_id == employee.employee_id) {
                Some(ledger) => ledger.deductions.push(deduction),
                None => payroll.push(PayrollRecord {
                    employee_id: employee.employee_id.clone(),
                    deductions: vec![deduction],
                }),
            }
            charges.push(OverdueCharge {
                task_id: task.task_id.clone(),
                employee_id: employee.employee_id.clone(),
                amount: penalty.amount,
                percent: penalty.percent,
            });
            task.penalty = Some(penalty);
        }

        if charges.is_empty() {
            return Ok(charges);
        }
        self.commit(vec![
            store::encode(Collection::Tasks, &tasks)?,
            store::encode(Collection::Payroll, &payroll)?,
        ])?;
        warn!("Charged {} overdue task(s) on {}", charges.len(), today);
        Ok(charges)
    }
}

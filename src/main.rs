// src/main.rs
use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hrpolicy::records::hhmm;
use hrpolicy::{
    bootstrap, landing_view, AppConfig, AttendanceFilter, Decision, HrService, JsonFileStore,
    NewRequest, RequestKind, Role, Session, Snapshot, TaskStatus,
};

#[derive(Parser, Debug)]
#[command(name = "hrpolicy", version, about = "Attendance, request, task and payroll policy engine")]
struct Cli {
    /// Overrides HRPOLICY_DATA_DIR
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Date used as "today" (YYYY-MM-DD); defaults to the local date
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed missing collections from the seed directory
    Init,
    /// Check credentials and show the landing view
    Login(Credentials),
    CheckIn {
        employee_id: String,
        #[arg(value_parser = parse_time)]
        time: NaiveTime,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    CheckOut {
        employee_id: String,
        #[arg(value_parser = parse_time)]
        time: NaiveTime,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// End-of-day sweep: auto-checkout and absences
    CloseDay {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Submit a request for an employee
    Request {
        employee_id: String,
        #[arg(long)]
        reason: String,
        #[command(subcommand)]
        kind: RequestCommand,
    },
    /// Approve or reject a pending request
    Decide {
        request_id: String,
        #[arg(value_enum)]
        verdict: Verdict,
        #[arg(long)]
        rejection_reason: Option<String>,
        #[command(flatten)]
        credentials: Credentials,
    },
    DeleteRequest {
        request_id: String,
    },
    /// List a manager's pending approvals
    Pending {
        manager_id: String,
    },
    /// Move a task one step forward
    AdvanceTask {
        task_id: String,
        #[arg(value_enum)]
        to: TaskStep,
    },
    /// Charge overdue tasks
    SweepTasks,
    /// Monthly statement for one employee, or all when omitted
    Payroll {
        employee_id: Option<String>,
        #[arg(long)]
        month: Option<String>,
    },
    /// Ideal employee for a month
    Ideal {
        #[arg(long)]
        month: Option<String>,
    },
    /// Quota usage for an employee
    Quota {
        employee_id: String,
    },
    /// HR report, or a manager's team summary
    Report {
        #[arg(long)]
        manager: Option<String>,
    },
    ExportJson {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    ImportJson {
        file: PathBuf,
    },
    ExportCsv {
        #[arg(long)]
        employee_id: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum RequestCommand {
    Tardiness {
        date: NaiveDate,
        #[arg(long, value_parser = parse_time)]
        expected_time: Option<NaiveTime>,
    },
    Absence {
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    },
    Wfh {
        date: NaiveDate,
    },
    Overtime {
        date: NaiveDate,
        hours: Decimal,
    },
    Extension {
        current_deadline: NaiveDate,
        requested_deadline: NaiveDate,
        #[arg(long)]
        task_id: Option<String>,
        #[arg(long, default_value = "")]
        task_name: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Verdict {
    Approve,
    Reject,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TaskStep {
    InProgress,
    Done,
}

fn parse_time(raw: &str) -> std::result::Result<NaiveTime, String> {
    hhmm::parse(raw).ok_or_else(|| format!("expected HH:MM, got '{}'", raw))
}

fn parse_month(raw: Option<&str>, today: NaiveDate) -> Result<(i32, u32)> {
    let Some(raw) = raw else {
        return Ok((today.year(), today.month()));
    };
    let first = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", raw))?;
    Ok((first.year(), first.month()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl From<RequestCommand> for RequestKind {
    fn from(command: RequestCommand) -> Self {
        match command {
            RequestCommand::Tardiness { date, expected_time } => RequestKind::Tardiness { date, expected_time },
            RequestCommand::Absence { start_date, end_date } => RequestKind::Absence {
                start_date,
                end_date: end_date.unwrap_or(start_date),
            },
            RequestCommand::Wfh { date } => RequestKind::WorkFromHome { date },
            RequestCommand::Overtime { date, hours } => RequestKind::Overtime { date, hours },
            RequestCommand::Extension {
                current_deadline,
                requested_deadline,
                task_id,
                task_name,
            } => RequestKind::DeadlineExtension {
                task_id,
                task_name,
                current_deadline,
                requested_deadline,
            },
        }
    }
}

fn main() -> Result<()> {
    // --- Setup ---
    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("Failed to read HRPOLICY_* configuration")?;
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Setting default subscriber failed")?;

    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let mut store = JsonFileStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open data directory {}", config.data_dir.display()))?;
    bootstrap(&mut store, &config.seed_dir).context("Bootstrap failed")?;
    let mut service = HrService::new(store).context("Failed to load settings")?;
    info!("Store ready at {}, today is {}", config.data_dir.display(), today);

    if config.auto_close_on_start {
        let report = service.close_day(today).context("Automatic close-day failed")?;
        info!("Auto close-day: {} absent, {} auto checkout(s)", report.marked_absent.len(), report.auto_checked_out.len());
    }

    run(cli.command, &mut service, today)
}

fn run(command: Command, service: &mut HrService<JsonFileStore>, today: NaiveDate) -> Result<()> {
    match command {
        Command::Init => {
            println!("Store initialised");
        }
        Command::Login(credentials) => {
            let employees = service.employees()?;
            let mut session = Session::new();
            let employee = session.login(&employees, &credentials.email, &credentials.password)?;
            println!(
                "Logged in as {} ({}), landing view: {:?}",
                employee.name,
                employee.role,
                landing_view(employee.role)
            );
        }
        Command::CheckIn { employee_id, time, date } => {
            let record = service.check_in(&employee_id, date.unwrap_or(today), time)?;
            print_json(&record)?;
        }
        Command::CheckOut { employee_id, time, date } => {
            let record = service.check_out(&employee_id, date.unwrap_or(today), time)?;
            print_json(&record)?;
        }
        Command::CloseDay { date } => {
            print_json(&service.close_day(date.unwrap_or(today))?)?;
        }
        Command::Request { employee_id, reason, kind } => {
            let request = service.submit_request(
                NewRequest {
                    employee_id,
                    kind: kind.into(),
                    reason,
                },
                today,
            )?;
            print_json(&request)?;
        }
        Command::Decide {
            request_id,
            verdict,
            rejection_reason,
            credentials,
        } => {
            let employees = service.employees()?;
            let mut session = Session::new();
            session.login(&employees, &credentials.email, &credentials.password)?;
            let actor = session.require(&[Role::Manager, Role::Hr, Role::Admin])?.clone();
            let decision = match verdict {
                Verdict::Approve => Decision::Approve,
                Verdict::Reject => Decision::Reject {
                    reason: rejection_reason,
                },
            };
            let (request, effect) = service.decide_request(&actor, &request_id, decision, today)?;
            print_json(&request)?;
            print_json(&effect)?;
        }
        Command::DeleteRequest { request_id } => {
            let removed = service.delete_request(&request_id)?;
            println!("Deleted {}", removed.request_id);
        }
        Command::Pending { manager_id } => {
            print_json(&service.pending_for_manager(&manager_id)?)?;
        }
        Command::AdvanceTask { task_id, to } => {
            let to = match to {
                TaskStep::InProgress => TaskStatus::InProgress,
                TaskStep::Done => TaskStatus::Done,
            };
            print_json(&service.advance_task(&task_id, to)?)?;
        }
        Command::SweepTasks => {
            print_json(&service.sweep_overdue_tasks(today)?)?;
        }
        Command::Payroll { employee_id, month } => {
            let (year, month) = parse_month(month.as_deref(), today)?;
            let ids = match employee_id {
                Some(id) => vec![id],
                None => service.payroll_roster()?,
            };
            let statements = ids
                .iter()
                .map(|id| service.monthly_statement(id, year, month))
                .collect::<hrpolicy::Result<Vec<_>>>()?;
            print_json(&statements)?;
        }
        Command::Ideal { month } => {
            let (year, month) = parse_month(month.as_deref(), today)?;
            match service.ideal_employee(year, month)? {
                Some(ideal) => print_json(&ideal)?,
                None => println!("No tracked employees"),
            }
        }
        Command::Quota { employee_id } => {
            print_json(&service.quota_usage(&employee_id, today)?)?;
        }
        Command::Report { manager } => match manager {
            Some(manager) => print_json(&service.team_day_summary(&manager, today)?)?,
            None => print_json(&service.hr_report(today)?)?,
        },
        Command::ExportJson { out } => {
            let snapshot = service.export_snapshot()?;
            let json = serde_json::to_string_pretty(&snapshot)?;
            match out {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Snapshot written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::ImportJson { file } => {
            let raw = fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let snapshot: Snapshot = serde_json::from_str(&raw).context("Snapshot is not valid JSON")?;
            service.import_snapshot(snapshot)?;
            println!("Imported {}", file.display());
        }
        Command::ExportCsv {
            employee_id,
            from,
            to,
            out,
        } => {
            let filter = AttendanceFilter { employee_id, from, to };
            let rows = match out {
                Some(path) => {
                    let file = fs::File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                    service.export_attendance_csv(file, &filter)?
                }
                None => service.export_attendance_csv(io::stdout().lock(), &filter)?,
            };
            if rows == 0 {
                warn!("No attendance rows matched the filter");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_request_subcommand() {
        let cli = Cli::try_parse_from([
            "hrpolicy", "--today", "2024-03-01", "request", "EMP001", "--reason", "Dentist", "absence", "2024-03-06",
        ])
        .unwrap();
        assert_eq!(cli.today, NaiveDate::from_ymd_opt(2024, 3, 1));
        match cli.command {
            Command::Request { kind, .. } => {
                let kind: RequestKind = kind.into();
                assert_eq!(
                    kind,
                    RequestKind::Absence {
                        start_date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
                        end_date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
                    }
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_month_defaults_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        assert_eq!(parse_month(None, today).unwrap(), (2024, 5));
        assert_eq!(parse_month(Some("2023-12"), today).unwrap(), (2023, 12));
        assert!(parse_month(Some("2023-13"), today).is_err());
    }

    #[test]
    fn test_check_in_time_accepts_hh_mm() {
        let cli = Cli::try_parse_from(["hrpolicy", "check-in", "EMP001", "09:45"]).unwrap();
        match cli.command {
            Command::CheckIn { time, .. } => assert_eq!(time, NaiveTime::from_hms_opt(9, 45, 0).unwrap()),
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["hrpolicy", "check-in", "EMP001", "nine"]).is_err());
    }
}

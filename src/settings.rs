// src/settings.rs
use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SettingsError, StoreError};
use crate::records::{hhmm, TaskPriority};
use crate::store::{Collection, Repository};

// Fallback for priorities missing from the task penalty table.
const DEFAULT_TASK_PENALTY_PERCENT: Decimal = dec!(5);

// --- Settings Structures ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatePenaltyTier {
    pub minutes: u32,
    pub percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsencePenalty {
    pub percent: Decimal,
    /// Vacation days deducted per unexcused absence.
    pub vacation_deduction: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OvertimePolicy {
    Pay,
    TimeOff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeSettings {
    pub weekday_multiplier: Decimal,
    pub weekend_multiplier: Decimal,
    pub policy: OvertimePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPenaltyRate {
    pub priority: TaskPriority,
    pub percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workweek {
    /// Lower-case weekday names, e.g. "friday".
    pub weekend_days: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRules {
    #[serde(with = "hhmm")]
    pub work_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub late_threshold: NaiveTime,
    #[serde(with = "hhmm")]
    pub absent_threshold: NaiveTime,
    pub late_percent: Decimal,
    #[serde(with = "hhmm")]
    pub auto_checkout_time: NaiveTime,
}

impl Default for AttendanceRules {
    fn default() -> Self {
        Self {
            work_start: hm(9, 0),
            late_threshold: hm(9, 30),
            absent_threshold: hm(11, 5),
            late_percent: dec!(10),
            auto_checkout_time: hm(17, 0),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// The singleton business configuration. Passed explicitly to every policy function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    pub late_penalties: Vec<LatePenaltyTier>,
    pub absence_penalty: AbsencePenalty,
    pub overtime: OvertimeSettings,
    pub task_penalties: Vec<TaskPenaltyRate>,
    pub deduction_cap_percent: Decimal,
    pub ideal_employee_bonus_percent: Decimal,
    pub workweek: Workweek,
    pub attendance_rules: AttendanceRules,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            late_penalties: vec![
                LatePenaltyTier { minutes: 30, percent: dec!(5) },
                LatePenaltyTier { minutes: 60, percent: dec!(10) },
                LatePenaltyTier { minutes: 120, percent: dec!(20) },
            ],
            absence_penalty: AbsencePenalty {
                percent: dec!(100),
                vacation_deduction: 1,
            },
            overtime: OvertimeSettings {
                weekday_multiplier: dec!(1.5),
                weekend_multiplier: dec!(2.0),
                policy: OvertimePolicy::Pay,
            },
            task_penalties: vec![
                TaskPenaltyRate { priority: TaskPriority::Low, percent: dec!(5) },
                TaskPenaltyRate { priority: TaskPriority::Medium, percent: dec!(8) },
                TaskPenaltyRate { priority: TaskPriority::High, percent: dec!(12) },
                TaskPenaltyRate { priority: TaskPriority::Critical, percent: dec!(15) },
            ],
            deduction_cap_percent: dec!(40),
            ideal_employee_bonus_percent: dec!(10),
            workweek: Workweek {
                weekend_days: vec!["friday".to_string(), "saturday".to_string()],
            },
            attendance_rules: AttendanceRules::default(),
        }
    }
}

impl SystemSettings {
    /// Builds settings from a stored document, filling every missing key from the defaults.
    pub fn merged_with_defaults(stored: Option<Value>) -> std::result::Result<Self, StoreError> {
        let Some(stored) = stored else {
            return Ok(Self::default());
        };
        let mut base = serde_json::to_value(Self::default())?;
        merge_json(&mut base, stored);
        serde_json::from_value(base).map_err(|e| StoreError::Malformed {
            collection: Collection::SystemSettings.key().to_string(),
            detail: e.to_string(),
        })
    }

    pub fn validate(&self) -> std::result::Result<(), SettingsError> {
        check_percent("absencePenalty.percent", self.absence_penalty.percent)?;
        check_percent("deductionCapPercent", self.deduction_cap_percent)?;
        check_percent("idealEmployeeBonusPercent", self.ideal_employee_bonus_percent)?;
        check_percent("attendanceRules.latePercent", self.attendance_rules.late_percent)?;
        for tier in &self.late_penalties {
            check_percent("latePenalties.percent", tier.percent)?;
        }
        if self
            .late_penalties
            .windows(2)
            .any(|pair| pair[0].minutes >= pair[1].minutes)
        {
            return Err(SettingsError::UnsortedLateTiers);
        }
        for rate in &self.task_penalties {
            check_percent("taskPenalties.percent", rate.percent)?;
        }
        check_non_negative("overtime.weekdayMultiplier", self.overtime.weekday_multiplier)?;
        check_non_negative("overtime.weekendMultiplier", self.overtime.weekend_multiplier)?;

        let rules = &self.attendance_rules;
        if !(rules.work_start <= rules.late_threshold && rules.late_threshold < rules.absent_threshold) {
            return Err(SettingsError::ThresholdOrder);
        }
        self.weekend_days()?;
        Ok(())
    }

    pub fn weekend_days(&self) -> std::result::Result<HashSet<Weekday>, SettingsError> {
        self.workweek
            .weekend_days
            .iter()
            .map(|name| {
                name.trim()
                    .parse::<Weekday>()
                    .map_err(|_| SettingsError::UnknownWeekday(name.clone()))
            })
            .collect()
    }

    // Unknown names are rejected on save, so they are ignored here.
    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        let day = date.weekday();
        self.workweek
            .weekend_days
            .iter()
            .filter_map(|name| name.trim().parse::<Weekday>().ok())
            .any(|weekend| weekend == day)
    }

    pub fn is_workday(&self, date: NaiveDate) -> bool {
        !self.is_weekend(date)
    }

    /// Percent of the daily wage charged when a task of this priority goes overdue.
    pub fn task_penalty_percent(&self, priority: TaskPriority) -> Decimal {
        self.task_penalties
            .iter()
            .find(|rate| rate.priority == priority)
            .map(|rate| rate.percent)
            .unwrap_or(DEFAULT_TASK_PENALTY_PERCENT)
    }
}

fn check_percent(field: &str, value: Decimal) -> std::result::Result<(), SettingsError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(SettingsError::PercentOutOfRange {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn check_non_negative(field: &str, value: Decimal) -> std::result::Result<(), SettingsError> {
    if value < Decimal::ZERO {
        return Err(SettingsError::Negative {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

/// Recursively overlays `overlay` onto `base`. Objects merge key by key; anything else replaces.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, Value::Null) => {
            debug!("Ignoring null override, keeping {}", slot);
        }
        (slot, value) => *slot = value,
    }
}

// --- Persistence ---

pub fn load_settings<R: Repository + ?Sized>(repo: &R) -> Result<SystemSettings> {
    let stored = repo.get(Collection::SystemSettings)?;
    if stored.is_none() {
        debug!("No stored settings, using defaults");
    }
    let settings = SystemSettings::merged_with_defaults(stored)?;
    if let Err(e) = settings.validate() {
        warn!("Stored settings fail validation ({}); they stay in effect until replaced", e);
    }
    Ok(settings)
}

/// Validates, then replaces the whole stored settings object.
pub fn save_settings<R: Repository + ?Sized>(repo: &mut R, settings: &SystemSettings) -> Result<()> {
    settings.validate()?;
    repo.put(Collection::SystemSettings, serde_json::to_value(settings)?)?;
    info!("System settings saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        let settings = SystemSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.deduction_cap_percent, dec!(40));
        assert_eq!(settings.attendance_rules.absent_threshold, hm(11, 5));
    }

    #[test]
    fn partial_document_is_merged_over_defaults() {
        let stored = json!({
            "deductionCapPercent": 25,
            "overtime": { "policy": "time-off" },
            "attendanceRules": { "lateThreshold": "09:15" }
        });
        let settings = SystemSettings::merged_with_defaults(Some(stored)).unwrap();
        assert_eq!(settings.deduction_cap_percent, dec!(25));
        assert_eq!(settings.overtime.policy, OvertimePolicy::TimeOff);
        assert_eq!(settings.overtime.weekend_multiplier, dec!(2.0));
        assert_eq!(settings.attendance_rules.late_threshold, hm(9, 15));
        assert_eq!(settings.attendance_rules.work_start, hm(9, 0));
        assert_eq!(settings.task_penalties.len(), 4);
    }

    #[test]
    fn arrays_are_replaced_not_merged() {
        let stored = json!({ "workweek": { "weekendDays": ["sunday"] } });
        let settings = SystemSettings::merged_with_defaults(Some(stored)).unwrap();
        assert_eq!(settings.workweek.weekend_days, vec!["sunday".to_string()]);
        assert!(settings.is_weekend(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()));
        assert!(!settings.is_weekend(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut settings = SystemSettings::default();
        settings.deduction_cap_percent = dec!(120);
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::PercentOutOfRange { .. })
        ));

        let mut settings = SystemSettings::default();
        settings.late_penalties.swap(0, 2);
        assert_eq!(settings.validate(), Err(SettingsError::UnsortedLateTiers));

        let mut settings = SystemSettings::default();
        settings.attendance_rules.absent_threshold = hm(9, 10);
        assert_eq!(settings.validate(), Err(SettingsError::ThresholdOrder));

        let mut settings = SystemSettings::default();
        settings.workweek.weekend_days.push("funday".into());
        assert_eq!(
            settings.validate(),
            Err(SettingsError::UnknownWeekday("funday".into()))
        );
    }

    #[test]
    fn unlisted_priority_falls_back_to_five_percent() {
        let mut settings = SystemSettings::default();
        settings.task_penalties.retain(|r| r.priority != TaskPriority::Critical);
        assert_eq!(settings.task_penalty_percent(TaskPriority::Critical), dec!(5));
        assert_eq!(settings.task_penalty_percent(TaskPriority::High), dec!(12));
    }

    #[test]
    fn save_replaces_whole_object_and_load_round_trips() {
        let mut repo = MemoryStore::new();
        assert_eq!(load_settings(&repo).unwrap(), SystemSettings::default());

        let mut settings = SystemSettings::default();
        settings.ideal_employee_bonus_percent = dec!(15);
        save_settings(&mut repo, &settings).unwrap();
        assert_eq!(load_settings(&repo).unwrap(), settings);

        settings.deduction_cap_percent = dec!(-1);
        assert!(save_settings(&mut repo, &settings).is_err());
        assert_eq!(load_settings(&repo).unwrap().deduction_cap_percent, dec!(40));
    }
}

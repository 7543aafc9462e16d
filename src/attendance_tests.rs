// src/attendance_tests.rs

#[cfg(test)]
mod tests {
    use crate::attendance::*;
    use crate::error::PolicyError;
    use crate::records::*;
    use crate::requests::{Decision, NewRequest};
    use crate::service::test_support::*;
    use crate::settings::SystemSettings;
    use chrono::NaiveTime;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn t(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn status_class(status: &AttendanceStatus) -> &'static str {
        match status {
            AttendanceStatus::Present { .. } => "Present",
            AttendanceStatus::Late { .. } => "Late",
            AttendanceStatus::Absent => "Absent",
            other => panic!("classifier produced unexpected status {}", other),
        }
    }

    // --- Classifier ---

    #[test]
    fn test_late_at_0945_costs_ten_percent() {
        let settings = SystemSettings::default();
        let result = classify_check_in(Some(t(9, 45)), false, &settings);
        assert_eq!(result.status, AttendanceStatus::Late { minutes_late: 45 });
        assert_eq!(result.penalties.wage_deduction, dec!(10));
        assert!(!result.penalties.vacation_day_deducted);
        assert_eq!(result.deduction_amount(dec!(200)), dec!(20));
    }

    #[test]
    fn test_boundaries_are_inclusive_on_lower_bound() {
        let settings = SystemSettings::default();

        let at_start = classify_check_in(Some(t(9, 0)), false, &settings);
        assert_eq!(at_start.status, AttendanceStatus::present());
        assert_eq!(at_start.penalties, Penalties::none());

        let at_late_no_permission = classify_check_in(Some(t(9, 30)), false, &settings);
        assert_eq!(at_late_no_permission.status, AttendanceStatus::Late { minutes_late: 30 });

        let at_late_with_permission = classify_check_in(Some(t(9, 30)), true, &settings);
        assert_eq!(
            at_late_with_permission.status,
            AttendanceStatus::Present {
                late_permission: true,
                tardiness_waived: false
            }
        );
        assert_eq!(at_late_with_permission.penalties.wage_deduction, dec!(0));

        let just_before_absent = classify_check_in(Some(t(11, 4)), true, &settings);
        assert_eq!(just_before_absent.message, "Very late");
        assert!(just_before_absent.status.is_late());

        let at_absent = classify_check_in(Some(t(11, 5)), true, &settings);
        assert_eq!(at_absent.status, AttendanceStatus::Absent);
        assert_eq!(at_absent.penalties, Penalties::full_day());
    }

    #[test]
    fn test_missing_check_in_is_absent() {
        let result = classify_check_in(None, true, &SystemSettings::default());
        assert_eq!(result.status, AttendanceStatus::Absent);
        assert_eq!(result.penalties.wage_deduction, dec!(100));
        assert!(result.penalties.vacation_day_deducted);
    }

    #[test]
    fn test_thresholds_come_from_settings() {
        let mut settings = SystemSettings::default();
        settings.attendance_rules.work_start = t(8, 0);
        settings.attendance_rules.late_percent = dec!(7);
        let result = classify_check_in(Some(t(8, 30)), false, &settings);
        assert_eq!(result.status, AttendanceStatus::Late { minutes_late: 30 });
        assert_eq!(result.penalties.wage_deduction, dec!(7));
    }

    #[test]
    fn test_late_minutes_never_negative() {
        let rules = SystemSettings::default().attendance_rules;
        assert_eq!(late_penalty_minutes(t(8, 15), &rules), 0);
        assert_eq!(late_penalty_minutes(t(10, 20), &rules), 80);
    }

    proptest! {
        #[test]
        fn prop_classification_is_total_and_deterministic(minute_of_day in 0u32..1440, permission in any::<bool>()) {
            let settings = SystemSettings::default();
            let time = t(minute_of_day / 60, minute_of_day % 60);
            let first = classify_check_in(Some(time), permission, &settings);
            let second = classify_check_in(Some(time), permission, &settings);
            prop_assert_eq!(&first, &second);

            let expected = if time <= t(9, 0) || (time <= t(9, 30) && permission) {
                "Present"
            } else if time < t(11, 5) {
                "Late"
            } else {
                "Absent"
            };
            prop_assert_eq!(status_class(&first.status), expected);
        }
    }

    // --- Check-in / check-out ---

    #[test]
    fn test_check_in_persists_classified_record() {
        let mut service = seeded_service();
        let record = service.check_in("EMP001", d("2024-03-04"), t(9, 45)).unwrap();
        assert_eq!(record.status, AttendanceStatus::Late { minutes_late: 45 });
        assert_eq!(record.check_in_time, Some(t(9, 45)));
        assert_eq!(service.attendance().unwrap(), vec![record]);
    }

    #[test]
    fn test_second_check_in_same_day_is_rejected() {
        let mut service = seeded_service();
        service.check_in("EMP001", d("2024-03-04"), t(8, 55)).unwrap();
        let err = service.check_in("EMP001", d("2024-03-04"), t(9, 10)).unwrap_err();
        assert!(matches!(err, PolicyError::AlreadyCheckedIn { .. }));
        assert_eq!(service.attendance().unwrap().len(), 1);
    }

    #[test]
    fn test_check_in_keeps_approved_work_from_home() {
        let mut service = seeded_service();
        let manager = service.find_employee("MGR001").unwrap();
        let request = service
            .submit_request(
                NewRequest {
                    employee_id: "EMP001".into(),
                    kind: RequestKind::WorkFromHome { date: d("2024-03-04") },
                    reason: "Plumber visit".into(),
                },
                d("2024-03-01"),
            )
            .unwrap();
        service
            .decide_request(&manager, &request.request_id, Decision::Approve, d("2024-03-02"))
            .unwrap();
        let before = service.attendance().unwrap();

        let err = service.check_in("EMP001", d("2024-03-04"), t(9, 45)).unwrap_err();
        assert!(matches!(err, PolicyError::AlreadyCheckedIn { .. }));
        assert_eq!(service.attendance().unwrap(), before);
        assert_eq!(before[0].status, AttendanceStatus::WorkFromHome);
        assert_eq!(before[0].penalties, Penalties::none());
    }

    #[test]
    fn test_check_in_replaces_swept_absence() {
        let mut service = seeded_service();
        service.close_day(d("2024-03-04")).unwrap();
        let record = service.check_in("EMP001", d("2024-03-04"), t(9, 45)).unwrap();
        assert_eq!(record.status, AttendanceStatus::Late { minutes_late: 45 });
        assert_eq!(record.penalties.wage_deduction, dec!(10));
        let day = service.attendance_for_day(d("2024-03-04")).unwrap();
        assert_eq!(day.iter().filter(|r| r.employee_id == "EMP001").count(), 1);
    }

    #[test]
    fn test_unknown_employee_cannot_check_in() {
        let mut service = seeded_service();
        let err = service.check_in("GHOST", d("2024-03-04"), t(9, 0)).unwrap_err();
        assert!(matches!(err, PolicyError::EmployeeNotFound { .. }));
        assert!(service.attendance().unwrap().is_empty());
    }

    #[test]
    fn test_approved_tardiness_grants_permission_at_check_in() {
        let mut service = seeded_service();
        let mut requests = service.requests().unwrap();
        requests.push(Request {
            request_id: "REQ-1".into(),
            employee_id: "EMP001".into(),
            manager_id: Some("MGR001".into()),
            kind: RequestKind::Tardiness {
                date: d("2024-03-04"),
                expected_time: Some(t(9, 20)),
            },
            reason: "Doctor".into(),
            status: RequestStatus::Approved,
            submitted_date: d("2024-03-01"),
            processed_date: Some(d("2024-03-02")),
            rejection_reason: None,
        });
        service.save_requests(&requests).unwrap();

        let record = service.check_in("EMP001", d("2024-03-04"), t(9, 20)).unwrap();
        assert_eq!(
            record.status,
            AttendanceStatus::Present {
                late_permission: true,
                tardiness_waived: false
            }
        );
        // Permission is per date.
        let other_day = service.check_in("EMP001", d("2024-03-05"), t(9, 20)).unwrap();
        assert!(other_day.status.is_late());
    }

    #[test]
    fn test_check_out_requires_check_in() {
        let mut service = seeded_service();
        let err = service.check_out("EMP001", d("2024-03-04"), t(17, 0)).unwrap_err();
        assert!(matches!(err, PolicyError::NotCheckedIn { .. }));

        service.check_in("EMP001", d("2024-03-04"), t(9, 0)).unwrap();
        let err = service.check_out("EMP001", d("2024-03-04"), t(8, 0)).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidField { .. }));

        let record = service.check_out("EMP001", d("2024-03-04"), t(17, 30)).unwrap();
        assert_eq!(record.check_out_time, Some(t(17, 30)));
        assert!(service.check_out("EMP001", d("2024-03-04"), t(18, 0)).is_err());
    }

    // --- End of day ---

    #[test]
    fn test_close_day_auto_checks_out_and_marks_absentees() {
        let mut service = seeded_service();
        // 2024-03-04 is a Monday.
        service.check_in("EMP001", d("2024-03-04"), t(8, 50)).unwrap();
        let report = service.close_day(d("2024-03-04")).unwrap();

        assert_eq!(report.auto_checked_out, vec!["EMP001".to_string()]);
        assert_eq!(report.marked_absent, vec!["MGR001".to_string(), "EMP002".to_string()]);

        let records = service.attendance_for_day(d("2024-03-04")).unwrap();
        let closed = records.iter().find(|r| r.employee_id == "EMP001").unwrap();
        assert_eq!(closed.check_out_time, Some(t(17, 0)));
        assert!(closed.auto_checkout && closed.needs_review);

        let absent = records.iter().find(|r| r.employee_id == "EMP002").unwrap();
        assert_eq!(absent.status, AttendanceStatus::Absent);
        assert_eq!(absent.penalties, Penalties::full_day());

        // HR and Security are exempt.
        assert!(records.iter().all(|r| r.employee_id != "HR001" && r.employee_id != "SEC001"));

        let again = service.close_day(d("2024-03-04")).unwrap();
        assert!(again.auto_checked_out.is_empty() && again.marked_absent.is_empty());
    }

    #[test]
    fn test_close_day_on_weekend_records_no_absences() {
        let mut service = seeded_service();
        // 2024-03-08 is a Friday, a weekend day by default.
        let report = service.close_day(d("2024-03-08")).unwrap();
        assert!(report.marked_absent.is_empty());
        assert!(service.attendance().unwrap().is_empty());
    }
}

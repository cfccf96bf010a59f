use chrono::{Duration, TimeZone, Utc};

use super::common::*;
use crate::workflows::scheduling::config_store::ScheduleConfigUpdate;
use crate::workflows::scheduling::domain::{ScheduleConfig, SessionStatus};
use crate::workflows::scheduling::repository::{ConfigRepository, SessionRepository};
use crate::workflows::scheduling::session::{SessionError, WindowStatus, LEASE_EXPIRED_REASON};

#[test]
fn second_employee_is_turned_away_until_the_holder_completes() {
    let harness = build_harness();
    let sessions = harness.service.sessions();

    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("first session starts");
    harness.clock.advance(Duration::seconds(150));

    match sessions.start_session(&id("e-ben"), "Ben Okafor", august()) {
        Err(SessionError::Busy { holder }) => {
            assert_eq!(holder.employee_name, "Aiko Tanaka");
            assert_eq!(holder.session_id, held.id);
            assert_eq!(holder.remaining_seconds, 450);
        }
        other => panic!("expected busy, got {other:?}"),
    }

    sessions.complete_session(&held.id).expect("holder completes");
    let next = sessions
        .start_session(&id("e-ben"), "Ben Okafor", august())
        .expect("retry succeeds");
    assert_eq!(next.employee_id, id("e-ben"));
}

#[test]
fn busy_error_names_the_holder() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("first session starts");

    let error = sessions
        .start_session(&id("e-ben"), "Ben Okafor", august())
        .expect_err("lock is held");
    assert_eq!(
        error.to_string(),
        "Aiko Tanaka is currently scheduling; try again in 600 seconds"
    );
}

#[test]
fn lapsed_lease_is_expired_by_the_next_caller() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("first session starts");

    harness.clock.advance(Duration::minutes(10));
    let status = sessions.is_system_busy().expect("busy check");
    assert!(!status.busy);

    let expired = sessions.view(&held.id).expect("session view");
    assert_eq!(expired.session.status, SessionStatus::Expired);
    assert_eq!(expired.session.end_reason.as_deref(), Some(LEASE_EXPIRED_REASON));
    assert_eq!(expired.remaining_seconds, 0);

    sessions
        .start_session(&id("e-ben"), "Ben Okafor", august())
        .expect("lock is free again");
}

#[test]
fn acquisition_expires_a_lapsed_holder_in_the_same_call() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("first session starts");

    harness.clock.advance(Duration::minutes(11));
    sessions
        .start_session(&id("e-ben"), "Ben Okafor", august())
        .expect("lapsed lease does not block");

    let previous = sessions.check_timeout(&held.id).expect("timeout check");
    assert_eq!(previous.status, SessionStatus::Expired);
}

#[test]
fn heartbeat_extends_the_lease() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("session starts");

    harness.clock.advance(Duration::minutes(8));
    sessions.update_activity(&held.id).expect("heartbeat");
    harness.clock.advance(Duration::minutes(8));

    match sessions.start_session(&id("e-ben"), "Ben Okafor", august()) {
        Err(SessionError::Busy { holder }) => assert_eq!(holder.remaining_seconds, 120),
        other => panic!("expected busy, got {other:?}"),
    }
    assert_eq!(
        sessions.view(&held.id).expect("view").remaining_seconds,
        120
    );
}

#[test]
fn heartbeat_after_expiry_reports_expired() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("session starts");

    harness.clock.advance(Duration::minutes(12));

    assert!(matches!(
        sessions.update_activity(&held.id),
        Err(SessionError::Expired(_))
    ));
    assert!(matches!(
        sessions.complete_session(&held.id),
        Err(SessionError::Expired(_))
    ));
}

#[test]
fn timeout_check_is_idempotent() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("session starts");

    assert_eq!(
        sessions.check_timeout(&held.id).expect("check").status,
        SessionStatus::Active
    );

    harness.clock.advance(Duration::minutes(10));
    let first = sessions.check_timeout(&held.id).expect("first check");
    harness.clock.advance(Duration::minutes(1));
    let second = sessions.check_timeout(&held.id).expect("second check");

    assert_eq!(first.status, SessionStatus::Expired);
    assert_eq!(first, second);
}

#[test]
fn completing_twice_is_rejected() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("session starts");

    let completed = sessions.complete_session(&held.id).expect("completes");
    assert_eq!(completed.status, SessionStatus::Completed);
    assert!(completed.end_time.is_some());
    assert!(matches!(
        sessions.complete_session(&held.id),
        Err(SessionError::AlreadyCompleted(_))
    ));
}

#[test]
fn unknown_session_is_not_found() {
    let harness = build_harness();
    assert!(matches!(
        harness
            .service
            .sessions()
            .view(&crate::workflows::scheduling::domain::SessionId("nope".to_string())),
        Err(SessionError::NotFound(_))
    ));
}

#[test]
fn force_end_clears_the_lock() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("session starts");

    let ended = sessions
        .force_end_all_sessions("store meeting")
        .expect("force end");

    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].id, held.id);
    assert_eq!(ended[0].end_reason.as_deref(), Some("store meeting"));
    assert!(!sessions.is_system_busy().expect("busy check").busy);
    assert!(sessions
        .force_end_all_sessions("again")
        .expect("force end")
        .is_empty());
}

#[test]
fn window_bounds_are_inclusive() {
    let harness = build_harness();
    let sessions = harness.service.sessions();

    harness
        .clock
        .set(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap());
    assert!(sessions.is_system_open(august()).expect("window").is_open());

    harness
        .clock
        .set(Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap());
    assert!(sessions.is_system_open(august()).expect("window").is_open());

    harness
        .clock
        .set(Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 1).unwrap());
    assert!(matches!(
        sessions.is_system_open(august()).expect("window"),
        WindowStatus::Closed { .. }
    ));
}

#[test]
fn sessions_cannot_start_outside_the_window() {
    let harness = build_harness();
    let sessions = harness.service.sessions();

    harness
        .clock
        .set(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap());
    match sessions.start_session(&id("e-aiko"), "Aiko Tanaka", august()) {
        Err(SessionError::SystemClosed { period, reason }) => {
            assert_eq!(period, august());
            assert!(reason.contains("open at"), "reason: {reason}");
        }
        other => panic!("expected closed window, got {other:?}"),
    }

    harness
        .clock
        .set(Utc.with_ymd_and_hms(2025, 8, 3, 12, 0, 0).unwrap());
    assert!(matches!(
        sessions.start_session(&id("e-aiko"), "Aiko Tanaka", august()),
        Err(SessionError::SystemClosed { .. })
    ));
    assert!(sessions.recent(10).expect("recent").is_empty());
}

#[test]
fn missing_window_bounds_are_reported_as_misconfigured() {
    let harness = build_harness();
    let provisioned: ScheduleConfig = harness
        .service
        .configs()
        .get_or_create(august())
        .expect("config");
    harness
        .configs
        .save(ScheduleConfig {
            version: provisioned.version + 1,
            system_open_at: None,
            ..provisioned
        })
        .expect("save");

    let window = harness
        .service
        .sessions()
        .is_system_open(august())
        .expect("window");
    assert!(matches!(window, WindowStatus::Misconfigured { .. }));
    assert!(!window.is_open());
}

#[test]
fn session_length_follows_the_period_config() {
    let harness = build_harness();
    harness.configure(ScheduleConfigUpdate {
        session_time_limit_seconds: Some(90),
        ..ScheduleConfigUpdate::default()
    });

    let held = harness
        .service
        .sessions()
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("session starts");
    assert_eq!(held.lease_seconds, 90);

    harness.clock.advance(Duration::seconds(90));
    assert!(!harness
        .service
        .sessions()
        .is_system_busy()
        .expect("busy check")
        .busy);
}

#[test]
fn ownership_is_checked_before_use() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let held = sessions
        .start_session(&id("e-aiko"), "Aiko Tanaka", august())
        .expect("session starts");

    assert!(sessions.ensure_held(&held.id, &id("e-aiko")).is_ok());
    assert!(matches!(
        sessions.ensure_held(&held.id, &id("e-ben")),
        Err(SessionError::NotOwner { .. })
    ));
}

#[test]
fn concurrent_starts_admit_exactly_one_holder() {
    let harness = build_harness();
    let sessions = harness.service.sessions();
    let roster = roster();

    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = roster
            .iter()
            .map(|employee| {
                scope.spawn(move || {
                    sessions
                        .start_session(&employee.id, &employee.name, august())
                        .is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread joins"))
            .collect()
    });

    assert_eq!(results.iter().filter(|started| **started).count(), 1);
    let active = harness
        .sessions
        .recent(10)
        .expect("recent")
        .into_iter()
        .filter(|session| session.is_active())
        .count();
    assert_eq!(active, 1);
}

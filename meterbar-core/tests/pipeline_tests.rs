//! Integration tests chaining the core algorithms the way providers use them.

use chrono::NaiveDate;
use meterbar_core::{
    Candidate, DailySample, ErrorKind, FetchResult, ProjectionConfig, ProviderKind,
    ProviderOutcome, ProviderResult, ReconcileError, ReconcileRules, UsageModel, keys, project,
    reconcile_candidates, wire,
};

#[test]
fn test_candidates_to_provider_result() {
    let candidates = vec![
        Candidate::unavailable("keychain", 30, ErrorKind::AuthenticationFailed, "token expired"),
        Candidate::new(UsageModel::quota(60.0, 100.0, false).unwrap(), 10, "env")
            .with_account_id("org-1"),
        Candidate::new(UsageModel::quota(55.0, 100.0, false).unwrap(), 20, "oauth")
            .with_account_id("org-1")
            .with_detail(keys::PLAN, "team"),
        Candidate::new(UsageModel::quota(90.0, 100.0, false).unwrap(), 5, "env_2")
            .with_account_id("org-2"),
    ];

    let accounts = reconcile_candidates(candidates, ReconcileRules::default()).unwrap();
    let result = ProviderResult::from_accounts(ProviderKind::Claude, accounts).unwrap();

    assert_eq!(result.account_count(), 2);
    assert_eq!(result.primary().account_id.as_deref(), Some("org-1"));
    assert_eq!(result.aggregate_usage.used_percent(), Some(45.0));
    assert_eq!(result.primary_details.text(keys::PLAN), Some("team"));
    assert_eq!(result.primary().source_labels, vec!["oauth", "env"]);
}

#[test]
fn test_all_sources_failed_is_auth_failure_in_cycle() {
    let err = reconcile_candidates(
        vec![Candidate::unavailable("env", 1, ErrorKind::AuthenticationFailed, "missing")],
        ReconcileRules::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ReconcileError::AllUnavailable { .. }));
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);

    let mut cycle = FetchResult::new(1);
    cycle.record_failure(ProviderKind::Cursor, ErrorKind::AuthenticationFailed);
    assert_eq!(
        cycle.outcome(ProviderKind::Cursor),
        ProviderOutcome::Failed(ErrorKind::AuthenticationFailed)
    );
    assert_eq!(cycle.outcome(ProviderKind::Kiro), ProviderOutcome::InFlight);
}

#[test]
fn test_decode_cache_blob_into_reading() {
    // { 1: { 3: fixed32 0.4 } , 2: "pro" }
    let mut inner = vec![0x1d];
    inner.extend(0.4f32.to_le_bytes());
    let mut blob = vec![0x0a, u8::try_from(inner.len()).unwrap()];
    blob.extend(&inner);
    blob.extend([0x12, 0x03, b'p', b'r', b'o']);

    let msg = wire::decode(&blob).unwrap();
    let fraction_left = msg.path(&[1, 3]).unwrap().and_then(|v| v.as_f32()).unwrap();
    let reading =
        UsageModel::quota(f64::from(fraction_left) * 100.0, 100.0, false).unwrap();
    assert!((reading.used_percent().unwrap() - 60.0).abs() < 1e-4);
    assert_eq!(msg.first(2).and_then(|v| v.as_str()), Some("pro"));

    assert!(wire::decode(&blob[..blob.len() - 1]).is_err());
}

#[test]
fn test_projection_from_mixed_provider_series() {
    let day = |d| NaiveDate::from_ymd_opt(2026, 9, d).unwrap();
    let openrouter = [DailySample::new(day(1), 4.0).unwrap(), DailySample::new(day(2), 6.0).unwrap()];
    let copilot = [DailySample::new(day(2), 4.0).unwrap()];

    let merged = meterbar_core::aggregate_by_date(openrouter.iter().chain(copilot.iter()));
    let p = project(&merged, day(3), &ProjectionConfig::uniform(2)).unwrap();

    // (4 + 10) / 2 = 7 per day, 28 days left in September including today
    assert!((p.current_month_total - 14.0).abs() < 1e-9);
    assert_eq!(p.remaining_days, 28);
    assert!((p.predicted_eom - (14.0 + 7.0 * 28.0)).abs() < 1e-9);
}

//! Usage metering end to end: quota enforcement, rollover and the
//! concurrency guarantee of check-and-consume.

mod common;

use std::sync::Arc;

use common::{account, t0, Engine};
use subscription_engine::application::handlers::{CheckAccessQuery, GetUsageHistoryQuery};
use subscription_engine::domain::catalog::{PlanCatalog, Quota, UsageType};
use subscription_engine::domain::metering::DenyReason;

const SMALL_CATALOG: &str = r#"
plans:
  - tier: free
    display_name: Free
    rank: 0
    monthly_price: 0
    yearly_price: 0
    quotas:
      ai_query: 5
  - tier: basic
    display_name: Basic
    rank: 1
    monthly_price: 19900
    yearly_price: 199000
    quotas:
      ai_query: 50
      case_search: unlimited
"#;

#[tokio::test]
async fn free_tier_allows_exactly_its_quota() {
    let engine = Engine::with_catalog(PlanCatalog::from_yaml(SMALL_CATALOG).unwrap());
    engine.start_free("acct-a").await;

    for expected_used in 1..=5 {
        let decision = engine.check("acct-a", UsageType::AiQuery).await;
        assert!(decision.allowed, "use {} should be allowed", expected_used);
        assert_eq!(decision.used, expected_used);
        assert_eq!(decision.remaining, Some(5 - expected_used));
    }

    let sixth = engine.check("acct-a", UsageType::AiQuery).await;
    assert!(!sixth.allowed);
    assert_eq!(sixth.used, 5);
    assert_eq!(sixth.limit, Quota::Limited(5));
    assert_eq!(sixth.reason, Some(DenyReason::QuotaExceeded));
}

#[tokio::test]
async fn usage_types_outside_the_plan_are_denied() {
    let engine = Engine::with_catalog(PlanCatalog::from_yaml(SMALL_CATALOG).unwrap());
    engine.start_free("acct-a").await;

    let decision = engine.check("acct-a", UsageType::CaseSearch).await;

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenyReason::NotIncludedInPlan));
}

#[tokio::test]
async fn account_without_subscription_is_denied() {
    let engine = Engine::new();

    let decision = engine.check("acct-nobody", UsageType::AiQuery).await;

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenyReason::NoSubscription));
    assert_eq!(engine.usage.calls(), 0);
}

#[tokio::test]
async fn period_rollover_resets_usage_and_keeps_history() {
    let engine = Engine::new();
    let sub = engine.subscribe("acct-c", "basic").await;
    let period_end = sub.current_period_end;

    for _ in 0..3 {
        assert!(engine.check("acct-c", UsageType::AiQuery).await.allowed);
    }

    engine.clock.set(period_end.plus_secs(1));
    let decision = engine.check("acct-c", UsageType::AiQuery).await;

    assert!(decision.allowed);
    assert_eq!(decision.used, 1);
    assert_eq!(decision.reset_at, Some(period_end.add_months(1)));

    let rolled = engine.load(&sub.id).await;
    assert_eq!(rolled.current_period_start, period_end);

    let history = engine
        .usage_history_handler()
        .handle(GetUsageHistoryQuery {
            account_id: account("acct-c"),
            usage_type: UsageType::AiQuery,
        })
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].period.start, period_end);
    assert_eq!(history[0].count, 1);
    assert_eq!(history[1].period.start, sub.current_period_start);
    assert_eq!(history[1].period.end, period_end);
    assert_eq!(history[1].count, 3);
}

#[tokio::test]
async fn checks_exactly_at_period_end_belong_to_next_period() {
    let engine = Engine::new();
    let sub = engine.subscribe("acct-edge", "basic").await;

    assert!(engine.check("acct-edge", UsageType::AiQuery).await.allowed);
    engine.clock.set(sub.current_period_end);

    let decision = engine.check("acct-edge", UsageType::AiQuery).await;
    assert_eq!(decision.used, 1);
    assert_eq!(engine.load(&sub.id).await.current_period_start, sub.current_period_end);
}

#[tokio::test]
async fn unused_periods_are_skipped_in_one_step() {
    let engine = Engine::new();
    let sub = engine.subscribe("acct-idle", "basic").await;

    engine.clock.set(t0().add_months(3).plus_secs(10));
    let decision = engine.check("acct-idle", UsageType::AiQuery).await;

    assert!(decision.allowed);
    assert_eq!(decision.used, 1);
    let stored = engine.load(&sub.id).await;
    assert!(stored.current_period_start <= t0().add_months(3).plus_secs(10));
    assert!(stored.current_period_end > t0().add_months(3).plus_secs(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_never_exceed_the_limit() {
    let engine = Arc::new(Engine::new());
    engine.start_free("acct-race").await;
    let limit = 10;
    let attempts = 64;

    let handler = Arc::new(engine.check_access_handler());
    let tasks = (0..attempts).map(|_| {
        let handler = handler.clone();
        tokio::spawn(async move {
            handler
                .handle(CheckAccessQuery {
                    account_id: account("acct-race"),
                    usage_type: UsageType::AiQuery,
                })
                .await
                .unwrap()
        })
    });

    let decisions: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let allowed = decisions.iter().filter(|d| d.allowed).count();
    assert_eq!(allowed, limit);
    assert!(decisions.iter().all(|d| d.used <= limit as u32));

    let after = engine.check("acct-race", UsageType::AiQuery).await;
    assert_eq!(after.used, limit as u32);
    assert!(!after.allowed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_across_a_rollover_open_one_new_period() {
    let engine = Arc::new(Engine::new());
    let sub = engine.subscribe("acct-roll", "basic").await;
    engine.clock.set(sub.current_period_end.plus_secs(1));

    let handler = Arc::new(engine.check_access_handler());
    let tasks = (0..16).map(|_| {
        let handler = handler.clone();
        tokio::spawn(async move {
            handler
                .handle(CheckAccessQuery {
                    account_id: account("acct-roll"),
                    usage_type: UsageType::AiQuery,
                })
                .await
        })
    });
    let results = futures::future::join_all(tasks).await;

    let allowed = results
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(|r| matches!(r, Ok(d) if d.allowed))
        .count();
    assert!(allowed >= 1);

    let stored = engine.load(&sub.id).await;
    assert_eq!(stored.current_period_start, sub.current_period_end);

    let history = engine
        .usage_history_handler()
        .handle(GetUsageHistoryQuery {
            account_id: account("acct-roll"),
            usage_type: UsageType::AiQuery,
        })
        .await
        .unwrap();
    assert_eq!(history[0].period.start, sub.current_period_end);
    assert_eq!(history[0].count as usize, allowed);
}

//! Composite evaluation strategies and leaf-level retry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use millrace::{Effect, Group, Named, Pair, RetryPolicy};

/// Fails its first `failures` executions, then succeeds with `value`.
fn flaky(runs: &Arc<AtomicU32>, failures: u32, value: u32) -> Effect<u32, String> {
    let runs = Arc::clone(runs);
    Effect::from_fn(move || {
        let attempt = runs.fetch_add(1, Ordering::SeqCst);
        if attempt < failures {
            Err(format!("transient failure {attempt}"))
        } else {
            Ok(value)
        }
    })
}

#[tokio::test]
async fn retry_each_recovers_both_children_sequentially() {
    let left_runs = Arc::new(AtomicU32::new(0));
    let right_runs = Arc::new(AtomicU32::new(0));

    let group = Group::sequential(vec![flaky(&left_runs, 2, 10), flaky(&right_runs, 2, 20)])
        .retry_each(RetryPolicy::limit_retries(2));

    assert_eq!(group.collect().run().await, Ok(vec![10, 20]));
    assert_eq!(left_runs.load(Ordering::SeqCst), 3);
    assert_eq!(right_runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_each_recovers_both_children_in_parallel() {
    let left_runs = Arc::new(AtomicU32::new(0));
    let right_runs = Arc::new(AtomicU32::new(0));

    let group = Group::parallel(vec![flaky(&left_runs, 2, 10), flaky(&right_runs, 2, 20)])
        .retry_each(RetryPolicy::limit_retries(2));

    assert_eq!(group.collect().run().await, Ok(vec![10, 20]));
}

#[tokio::test]
async fn whole_composite_retry_fails_when_budget_is_too_small() {
    // Each child needs 2 retries of its own, but whole-composite retry
    // restarts both children per attempt, so the flaky pair never gets
    // far enough within one retry.
    let left_runs = Arc::new(AtomicU32::new(0));
    let right_runs = Arc::new(AtomicU32::new(0));

    let first = flaky(&left_runs, 2, 10);
    let second = {
        let runs = Arc::clone(&right_runs);
        Effect::from_fn(move || {
            // Fails on every even-numbered execution, so re-running the
            // whole chain keeps tripping over one child or the other.
            let attempt = runs.fetch_add(1, Ordering::SeqCst);
            if attempt % 2 == 0 {
                Err(format!("even attempt {attempt}"))
            } else {
                Ok(20u32)
            }
        })
    };

    let result = Group::sequential(vec![first, second])
        .retry(RetryPolicy::limit_retries(1))
        .run()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn pair_combines_distinct_types_under_retry_each() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);
    let flaky_name: Effect<String, String> = Effect::from_fn(move || {
        if counter.fetch_add(1, Ordering::SeqCst) < 1 {
            Err("name service warming up".to_string())
        } else {
            Ok("mill".to_string())
        }
    });

    let pair = Pair::parallel(Effect::succeed(7u32), flaky_name)
        .retry_each(RetryPolicy::limit_retries(3));
    assert_eq!(pair.collect().run().await, Ok((7, "mill".to_string())));
}

#[tokio::test]
async fn named_record_aggregates_under_parallel_evaluation() {
    let record = Named::parallel(vec![
        (
            "fast".to_string(),
            Effect::<_, String>::from_async(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(1)
            }),
        ),
        (
            "slow".to_string(),
            Effect::from_async(|| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(2)
            }),
        ),
    ]);

    let map: HashMap<String, i32> = record.collect().run().await.unwrap();
    assert_eq!(map["fast"], 1);
    assert_eq!(map["slow"], 2);
}

#[tokio::test]
async fn boolean_reducers_match_their_truth_tables() {
    async fn all_of(values: Vec<bool>) -> Result<bool, String> {
        Group::parallel(values.into_iter().map(Effect::succeed).collect())
            .all()
            .run()
            .await
    }
    async fn any_of(values: Vec<bool>) -> Result<bool, String> {
        Group::parallel(values.into_iter().map(Effect::succeed).collect())
            .any()
            .run()
            .await
    }

    assert_eq!(all_of(vec![true, true]).await, Ok(true));
    assert_eq!(all_of(vec![true, false]).await, Ok(false));
    assert_eq!(any_of(vec![true, false]).await, Ok(true));
    assert_eq!(any_of(vec![false, false]).await, Ok(false));
}

#[tokio::test]
async fn any_still_fails_on_a_permanent_child_failure() {
    let group = Group::parallel(vec![
        Effect::succeed(true),
        Effect::<bool, _>::fail("permanently broken".to_string())
            .retry(RetryPolicy::limit_retries(2)),
    ]);

    assert_eq!(
        group.any().run().await,
        Err("permanently broken".to_string())
    );
}

#[tokio::test]
async fn aggregated_outcome_flows_through_effect_combinators() {
    let total = Group::sequential(vec![
        Effect::<_, String>::succeed(1),
        Effect::succeed(2),
        Effect::succeed(3),
    ])
    .collect()
    .map(|values| values.into_iter().sum::<i32>())
    .and_then(|sum| Effect::succeed(sum * 10));

    assert_eq!(total.run().await, Ok(60));
}

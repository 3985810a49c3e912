//! Property-based tests for the retry-policy algebra

use proptest::prelude::*;
use std::time::Duration;

use millrace::{RetryDecision, RetryPolicy, RetryStatus};

fn arbitrary_status() -> impl Strategy<Value = RetryStatus> {
    (0u32..64, prop::option::of(0u64..10_000), 0u64..1_000_000).prop_map(
        |(iterations, previous_ms, step_ms)| {
            let mut status = RetryStatus::initial();
            for _ in 0..iterations {
                status = status.advanced_by(Duration::from_millis(step_ms % 1000));
            }
            if let Some(ms) = previous_ms {
                status = status.advanced_by(Duration::from_millis(ms));
            }
            status
        },
    )
}

proptest! {
    #[test]
    fn prop_append_stops_when_either_stops(
        limit in 0u32..20,
        status in arbitrary_status()
    ) {
        let counting = RetryPolicy::limit_retries(limit);
        let always = RetryPolicy::constant_delay(Duration::from_millis(1));

        let combined = always.clone().append(counting.clone());
        let expected_stop = !counting.decide(&status).is_retry()
            || !always.decide(&status).is_retry();
        prop_assert_eq!(!combined.decide(&status).is_retry(), expected_stop);
    }

    #[test]
    fn prop_append_takes_max_of_delays(
        a_ms in 0u64..5_000,
        b_ms in 0u64..5_000,
        status in arbitrary_status()
    ) {
        let a = RetryPolicy::constant_delay(Duration::from_millis(a_ms));
        let b = RetryPolicy::constant_delay(Duration::from_millis(b_ms));

        let decision = a.append(b).decide(&status);
        prop_assert_eq!(
            decision.delay(),
            Some(Duration::from_millis(a_ms.max(b_ms)))
        );
    }

    #[test]
    fn prop_append_is_commutative_on_decisions(
        limit in 0u32..20,
        delay_ms in 0u64..5_000,
        status in arbitrary_status()
    ) {
        let a = RetryPolicy::limit_retries(limit);
        let b = RetryPolicy::constant_delay(Duration::from_millis(delay_ms));

        let left = a.clone().append(b.clone()).decide(&status);
        let right = b.append(a).decide(&status);
        prop_assert_eq!(left, right);
    }

    #[test]
    fn prop_simulate_length_for_limit_retries(
        retries in 0u32..50,
        max_attempts in 1usize..80
    ) {
        let trace = RetryPolicy::limit_retries(retries).simulate(max_attempts);
        // One initial status plus at most `retries` retried attempts,
        // truncated to the simulation budget.
        let expected = max_attempts.min(retries as usize + 1);
        prop_assert_eq!(trace.len(), expected);
    }

    #[test]
    fn prop_simulate_statuses_are_consistent(
        base_ms in 1u64..100,
        retries in 1u32..20
    ) {
        let policy = RetryPolicy::exponential_backoff(Duration::from_millis(base_ms))
            .append(RetryPolicy::limit_retries(retries));

        let trace = policy.simulate(64);
        prop_assert_eq!(&trace[0], &RetryStatus::initial());
        let mut cumulative = Duration::ZERO;
        for (index, status) in trace.iter().enumerate() {
            prop_assert_eq!(status.iteration() as usize, index);
            cumulative += status.previous_delay().unwrap_or(Duration::ZERO);
            prop_assert_eq!(status.cumulative_delay(), cumulative);
        }
    }

    #[test]
    fn prop_cap_delay_never_exceeds_cap(
        base_ms in 1u64..10_000,
        cap_ms in 1u64..1_000,
        status in arbitrary_status()
    ) {
        let policy = RetryPolicy::exponential_backoff(Duration::from_millis(base_ms))
            .cap_delay(Duration::from_millis(cap_ms));

        match policy.decide(&status) {
            RetryDecision::Retry(delay) => {
                prop_assert!(delay <= Duration::from_millis(cap_ms));
            }
            RetryDecision::GiveUp => {}
        }
    }

    #[test]
    fn prop_limit_retries_decides_purely_on_iteration(
        limit in 0u32..50,
        status in arbitrary_status()
    ) {
        let decision = RetryPolicy::limit_retries(limit).decide(&status);
        prop_assert_eq!(decision.is_retry(), status.iteration() < limit);
    }
}

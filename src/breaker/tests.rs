//! Unit tests for the breaker state machine, driven without any networking.
//! 熔断器状态机的单元测试，不涉及任何网络。

use super::*;
use crate::config::BreakerConfig;
use crate::error::StatusCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;
use tokio::time::{Duration, advance};

fn test_config() -> BreakerConfig {
    BreakerConfig {
        min_requests: 10,
        failure_rate_threshold: 0.5,
        open_duration: Duration::from_secs(1),
        max_half_open_probes: 1,
        rolling_interval: Duration::from_secs(60),
    }
}

fn new_breaker() -> CircuitBreaker {
    CircuitBreaker::new(test_config(), FailureClassifier::default())
}

fn unavailable() -> Error {
    Error::CallFailed {
        code: StatusCode::Unavailable,
        message: "upstream down".to_string(),
    }
}

async fn run_ok(breaker: &CircuitBreaker) -> Result<()> {
    breaker.execute(|| async { Ok(()) }).await
}

async fn run_failure(breaker: &CircuitBreaker) -> Result<()> {
    breaker.execute(|| async { Err(unavailable()) }).await
}

#[tokio::test]
async fn test_breaker_trips_at_failure_rate() {
    let breaker = new_breaker();

    // 5次成功 + 5次失败：恰好达到 50% 的失败率
    // 5 successes + 5 failures: exactly the 50% failure rate.
    for _ in 0..5 {
        run_ok(&breaker).await.unwrap();
    }
    for _ in 0..4 {
        assert!(run_failure(&breaker).await.is_err());
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }
    assert!(run_failure(&breaker).await.is_err());

    assert_eq!(breaker.state().await, BreakerState::Open);
    // 跳闸时计数被重置
    // Counts are reset when the breaker trips.
    assert_eq!(breaker.counts().await, Counts::default());
}

#[tokio::test]
async fn test_open_rejects_without_invoking_operation() {
    let breaker = new_breaker();
    for _ in 0..10 {
        let _ = run_failure(&breaker).await;
    }
    assert_eq!(breaker.state().await, BreakerState::Open);

    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = invocations.clone();
    let result = breaker
        .execute(|| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(Error::BreakerOpen)));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_trip_below_min_requests() {
    let breaker = new_breaker();

    // 9次全部失败仍低于最小样本数
    // 9 failures in a row is still below the minimum sample size.
    for _ in 0..9 {
        assert!(run_failure(&breaker).await.is_err());
    }
    assert_eq!(breaker.state().await, BreakerState::Closed);
    assert_eq!(
        breaker.counts().await,
        Counts {
            requests: 9,
            successes: 0,
            failures: 9
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_to_half_open_to_closed() {
    let breaker = new_breaker();
    for _ in 0..10 {
        let _ = run_failure(&breaker).await;
    }
    assert_eq!(breaker.state().await, BreakerState::Open);

    // open_duration 未到之前仍然拒绝
    // Still rejected before open_duration has elapsed.
    advance(Duration::from_millis(500)).await;
    assert!(matches!(run_ok(&breaker).await, Err(Error::BreakerOpen)));

    advance(Duration::from_millis(600)).await;
    // 下一次调用作为探测被放行；成功后回到 Closed
    // The next call is admitted as a probe; success closes the breaker.
    run_ok(&breaker).await.unwrap();
    assert_eq!(breaker.state().await, BreakerState::Closed);
    assert_eq!(breaker.counts().await, Counts::default());
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_reopens_and_refreshes_timer() {
    let breaker = new_breaker();
    for _ in 0..10 {
        let _ = run_failure(&breaker).await;
    }

    advance(Duration::from_secs(2)).await;
    assert!(run_failure(&breaker).await.is_err());
    assert_eq!(breaker.state().await, BreakerState::Open);

    // 探测失败刷新了 opened_at：未满 open_duration 仍被拒绝
    // The failed probe refreshed opened_at: still rejected before a full open_duration.
    advance(Duration::from_millis(500)).await;
    assert!(matches!(run_ok(&breaker).await, Err(Error::BreakerOpen)));

    advance(Duration::from_millis(600)).await;
    run_ok(&breaker).await.unwrap();
    assert_eq!(breaker.state().await, BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_probe_limit() {
    let breaker = Arc::new(new_breaker());
    for _ in 0..10 {
        let _ = run_failure(&breaker).await;
    }
    advance(Duration::from_secs(2)).await;

    // 第一个探测挂起，占用唯一的探测名额
    // The first probe parks, holding the only probe slot.
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let probe_breaker = breaker.clone();
    let probe = tokio::spawn(async move {
        probe_breaker
            .execute(|| async {
                let _ = release_rx.await;
                Ok(())
            })
            .await
    });

    // 让探测任务先被准入
    // Let the probe task get admitted first.
    while breaker.state().await != BreakerState::HalfOpen {
        tokio::task::yield_now().await;
    }

    assert!(matches!(run_ok(&breaker).await, Err(Error::BreakerOpen)));

    release_tx.send(()).unwrap();
    probe.await.unwrap().unwrap();
    assert_eq!(breaker.state().await, BreakerState::Closed);
}

#[tokio::test]
async fn test_caller_faults_never_trip() {
    let breaker = new_breaker();

    for _ in 0..100 {
        let result = breaker
            .execute(|| async {
                Err::<(), _>(Error::CallFailed {
                    code: StatusCode::InvalidArgument,
                    message: "bad request".to_string(),
                })
            })
            .await;
        assert!(result.is_err());
    }

    assert_eq!(breaker.state().await, BreakerState::Closed);
    assert_eq!(
        breaker.counts().await,
        Counts {
            requests: 100,
            successes: 100,
            failures: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_window_rollover_resets_counts() {
    let breaker = new_breaker();

    // 9次失败：低于最小样本数，尚未跳闸
    // 9 failures: below the minimum sample size, no trip yet.
    for _ in 0..9 {
        let _ = run_failure(&breaker).await;
    }

    // 窗口滚动后，久远的失败不能与新的失败叠加
    // After the window rolls over, stale failures cannot combine with new ones.
    advance(Duration::from_secs(61)).await;
    for _ in 0..5 {
        run_ok(&breaker).await.unwrap();
    }
    for _ in 0..4 {
        let _ = run_failure(&breaker).await;
    }

    assert_eq!(breaker.state().await, BreakerState::Closed);
    assert_eq!(
        breaker.counts().await,
        Counts {
            requests: 9,
            successes: 5,
            failures: 4
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_stale_outcome_is_dropped_after_reset() {
    let breaker = Arc::new(new_breaker());

    // 一个在旧窗口中被准入、完成得很慢的调用
    // A call admitted in the old window that completes slowly.
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let slow_breaker = breaker.clone();
    let slow = tokio::spawn(async move {
        slow_breaker
            .execute(|| async {
                let _ = release_rx.await;
                Err::<(), _>(unavailable())
            })
            .await
    });
    tokio::task::yield_now().await;

    // 窗口滚动（由下一次准入触发）
    // The window rolls over (triggered by the next admission).
    advance(Duration::from_secs(61)).await;
    run_ok(&breaker).await.unwrap();

    release_tx.send(()).unwrap();
    assert!(slow.await.unwrap().is_err());

    // 迟到的失败没有落入新窗口的计数
    // The late failure did not land in the new window's counts.
    assert_eq!(
        breaker.counts().await,
        Counts {
            requests: 1,
            successes: 1,
            failures: 0
        }
    );
}

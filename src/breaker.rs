//! 熔断器：一个基于失败率的调用准入状态机。
//! The circuit breaker: a failure-rate driven admission state machine for calls.

use crate::config::BreakerConfig;
use crate::error::{Error, Result};
use classifier::{FailureClassifier, Outcome};
use std::future::Future;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

pub mod classifier;

#[cfg(test)]
mod tests;

/// The three named states of the breaker.
///
/// 熔断器的三个命名状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation: every call is attempted and its outcome recorded.
    /// 正常运行：每个调用都会被尝试并记录其结果。
    Closed,
    /// The remote is judged unhealthy: calls are rejected without an attempt.
    /// 远端被判定为不健康：调用未经尝试即被拒绝。
    Open,
    /// Recovery probing: a bounded number of concurrent calls is admitted.
    /// 恢复探测：允许有限数量的并发调用。
    HalfOpen,
}

impl BreakerState {
    /// The allowed-transition table. Anything not listed here is a logic bug.
    ///
    /// 允许的状态转换表。未列出的转换均为逻辑错误。
    fn can_transition_to(self, to: BreakerState) -> bool {
        matches!(
            (self, to),
            (BreakerState::Closed, BreakerState::Open)
                | (BreakerState::Open, BreakerState::HalfOpen)
                | (BreakerState::HalfOpen, BreakerState::Closed)
                | (BreakerState::HalfOpen, BreakerState::Open)
        )
    }

    /// Gets the string representation of the state.
    /// 获取状态的字符串表示。
    pub fn name(self) -> &'static str {
        match self {
            BreakerState::Closed => "Closed",
            BreakerState::Open => "Open",
            BreakerState::HalfOpen => "HalfOpen",
        }
    }
}

/// Call outcomes accumulated within the current window or probe phase.
///
/// 当前窗口或探测阶段内累计的调用结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Calls whose outcome has been recorded.
    /// 已记录结果的调用数。
    pub requests: u32,
    /// Outcomes classified as success (including caller-fault errors).
    /// 被归类为成功的结果数（包括调用方过错的错误）。
    pub successes: u32,
    /// Outcomes classified as breaker-relevant failures.
    /// 被归类为熔断相关失败的结果数。
    pub failures: u32,
}

/// A ticket handed out at admission time. Settling an outcome against a
/// stale ticket (the breaker reset in the meantime) is a no-op.
///
/// 在准入时发放的票据。若票据已过期（期间熔断器已重置），记录结果将不生效。
#[derive(Debug, Clone, Copy)]
struct Admission {
    generation: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    counts: Counts,
    /// Bumped on every state transition and window rollover; guards against
    /// a slow in-flight call settling into counts that were reset while it ran.
    /// 每次状态转换与窗口滚动时递增；防止缓慢的在途调用把结果记入已被重置的计数。
    generation: u64,
    opened_at: Option<Instant>,
    window_started_at: Instant,
    half_open_in_flight: u32,
}

impl BreakerInner {
    /// Executes a state transition through the allowed-transition table,
    /// resetting counts and bumping the generation.
    ///
    /// 通过允许转换表执行状态转换，重置计数并递增代数。
    fn transition(&mut self, to: BreakerState, now: Instant) {
        let from = self.state;
        if !from.can_transition_to(to) {
            warn!(
                from = from.name(),
                to = to.name(),
                "invalid breaker state transition attempted"
            );
            return;
        }

        self.state = to;
        self.generation += 1;
        self.counts = Counts::default();
        self.half_open_in_flight = 0;
        self.window_started_at = now;
        self.opened_at = (to == BreakerState::Open).then_some(now);

        info!(from = from.name(), to = to.name(), "breaker state transition");
    }

    /// Resets the closed-state window without a state transition.
    /// 在不发生状态转换的情况下重置关闭状态的窗口。
    fn roll_window(&mut self, now: Instant) {
        self.generation += 1;
        self.counts = Counts::default();
        self.window_started_at = now;
        trace!("breaker window rolled over");
    }
}

/// A failure-rate circuit breaker gating one remote operation.
///
/// State mutations are linearized through an internal lock held only for the
/// admission and bookkeeping phases, never across the in-flight call itself.
///
/// 门控单个远程操作的失败率熔断器。
///
/// 状态变更通过内部锁线性化；锁仅在准入与记账阶段持有，绝不跨越在途调用本身。
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    classifier: FailureClassifier,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker in the `Closed` state.
    /// 创建一个处于 `Closed` 状态的熔断器。
    pub fn new(config: BreakerConfig, classifier: FailureClassifier) -> Self {
        Self {
            config,
            classifier,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                counts: Counts::default(),
                generation: 0,
                opened_at: None,
                window_started_at: Instant::now(),
                half_open_in_flight: 0,
            }),
        }
    }

    /// Wraps a single attempt of `op`: checks admission, runs the operation,
    /// classifies the outcome and performs any pending state transition.
    ///
    /// Rejections surface as [`Error::BreakerOpen`] without the operation
    /// being invoked at all.
    ///
    /// 包装 `op` 的单次尝试：检查准入，运行操作，对结果进行分类并执行任何
    /// 待定的状态转换。被拒绝时返回 [`Error::BreakerOpen`]，且操作完全不会被调用。
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let admission = self.admit().await?;
        let result = op().await;
        self.settle(admission, &result).await;
        result
    }

    /// The current state. Intended for observability and tests.
    /// 当前状态。用于可观测性与测试。
    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }

    /// The counts of the current window or probe phase.
    /// 当前窗口或探测阶段的计数。
    pub async fn counts(&self) -> Counts {
        self.inner.lock().await.counts
    }

    /// The classifier this breaker records outcomes with.
    /// 此熔断器用于记录结果的分类器。
    pub fn classifier(&self) -> &FailureClassifier {
        &self.classifier
    }

    /// Checks whether a call may be attempted right now.
    /// 检查当前是否允许尝试一次调用。
    async fn admit(&self) -> Result<Admission> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        match inner.state {
            BreakerState::Closed => {
                if now.duration_since(inner.window_started_at) >= self.config.rolling_interval {
                    inner.roll_window(now);
                }
                Ok(Admission {
                    generation: inner.generation,
                })
            }
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|at| now.duration_since(at));
                if elapsed.is_some_and(|e| e >= self.config.open_duration) {
                    inner.transition(BreakerState::HalfOpen, now);
                    inner.half_open_in_flight = 1;
                    Ok(Admission {
                        generation: inner.generation,
                    })
                } else {
                    debug!("call rejected: breaker is open");
                    Err(Error::BreakerOpen)
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight < self.config.max_half_open_probes {
                    inner.half_open_in_flight += 1;
                    Ok(Admission {
                        generation: inner.generation,
                    })
                } else {
                    debug!("call rejected: half-open probe limit reached");
                    Err(Error::BreakerOpen)
                }
            }
        }
    }

    /// Records the outcome of an admitted call and performs transitions.
    /// 记录一次已准入调用的结果并执行状态转换。
    async fn settle<T>(&self, admission: Admission, result: &Result<T>) {
        let outcome = self.classifier.classify(result);

        let mut inner = self.inner.lock().await;
        if inner.generation != admission.generation {
            // The breaker reset while this call was in flight; its outcome
            // no longer describes the current window.
            // 调用在途期间熔断器已重置；其结果不再描述当前窗口。
            trace!("stale breaker outcome dropped");
            return;
        }
        let now = Instant::now();

        inner.counts.requests += 1;
        match outcome {
            Outcome::Success => inner.counts.successes += 1,
            Outcome::Failure => inner.counts.failures += 1,
        }

        match inner.state {
            BreakerState::Closed => {
                let counts = inner.counts;
                if outcome == Outcome::Failure
                    && counts.requests >= self.config.min_requests
                    && f64::from(counts.failures) / f64::from(counts.requests)
                        >= self.config.failure_rate_threshold
                {
                    warn!(
                        requests = counts.requests,
                        failures = counts.failures,
                        "failure rate threshold reached, tripping breaker"
                    );
                    inner.transition(BreakerState::Open, now);
                }
            }
            BreakerState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                match outcome {
                    Outcome::Success => inner.transition(BreakerState::Closed, now),
                    Outcome::Failure => inner.transition(BreakerState::Open, now),
                }
            }
            // A same-generation outcome cannot settle while Open: entering
            // Open bumps the generation.
            // 同代结果不可能在 Open 状态下落账：进入 Open 会递增代数。
            BreakerState::Open => {}
        }
    }
}

//! 定义了限定单个调用方等待范围的 `CallScope`。
//! Defines `CallScope`, which bounds the wait of a single caller.

use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// The cancellation/timeout scope of a single caller.
///
/// A scope bounds only the wait of the caller holding it. Handing a scope to
/// `ensure_connection` or `call` never cancels work that other callers share:
/// the shared dial keeps running when one waiter's scope ends.
///
/// 单个调用方的取消/超时范围。
///
/// 范围只约束持有它的调用方自身的等待。将范围传给 `ensure_connection` 或
/// `call` 不会取消其他调用方共享的工作：某个等待者的范围结束时，共享的拨号
/// 仍会继续进行。
#[derive(Debug, Clone)]
pub struct CallScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for CallScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CallScope {
    /// Creates a scope with no deadline; it ends only when [`cancel`](Self::cancel) is called.
    ///
    /// 创建一个没有截止时间的范围；仅在调用 [`cancel`](Self::cancel) 时结束。
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Creates a scope that ends after `timeout`, or earlier if canceled.
    ///
    /// 创建一个在 `timeout` 之后结束的范围（若被取消则更早结束）。
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Creates a scope that ends at `deadline`, or earlier if canceled.
    ///
    /// 创建一个在 `deadline` 时刻结束的范围（若被取消则更早结束）。
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derives a child scope. Canceling the parent ends the child; canceling
    /// the child leaves the parent untouched. The deadline is inherited.
    ///
    /// 派生一个子范围。取消父范围会结束子范围；取消子范围不影响父范围。
    /// 截止时间被继承。
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Ends the scope now. Idempotent.
    ///
    /// 立即结束该范围。幂等。
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the scope has been canceled or its deadline passed.
    ///
    /// 一旦范围被取消或其截止时间已过，返回 `true`。
    pub fn is_ended(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// The deadline of this scope, if it has one.
    /// 该范围的截止时间（如果有）。
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves when the scope ends, by cancellation or by deadline. Pending
    /// forever for a scope that has neither.
    ///
    /// 在范围结束时完成（无论是被取消还是截止时间已到）。对于两者皆无的范围，
    /// 永远保持挂起。
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ends_scope() {
        let scope = CallScope::with_timeout(Duration::from_millis(50));
        assert!(!scope.is_ended());

        scope.cancelled().await;
        assert!(scope.is_ended());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_observable() {
        let scope = CallScope::new();
        scope.cancel();
        scope.cancel();
        assert!(scope.is_ended());
        // 已取消的范围立即完成
        // A canceled scope resolves immediately.
        scope.cancelled().await;
    }

    #[tokio::test]
    async fn test_child_cancellation_is_one_way() {
        let parent = CallScope::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_ended());
        assert!(!parent.is_ended());

        let parent = CallScope::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_ended());
    }
}

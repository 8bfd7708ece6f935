//! 弹性客户端门面：围绕单个类型化远程操作组合连接管理器与熔断器。
//! The resilient client facade: composes the connection manager and the
//! circuit breaker around one typed remote operation.

use super::manager::ConnectionManager;
use super::retry;
use crate::breaker::CircuitBreaker;
use crate::breaker::classifier::FailureClassifier;
use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::scope::CallScope;
use crate::transport::{Connector, RemoteOperation};
use std::sync::Arc;
use tracing::debug;

/// Binds a [`ConnectionManager`] and a [`CircuitBreaker`] to one typed remote
/// operation, and optionally layers a bounded transport-level retry above the
/// breaker.
///
/// 将 [`ConnectionManager`] 与 [`CircuitBreaker`] 绑定到单个类型化远程操作，
/// 并可选地在熔断器之上叠加有界的传输层重试。
pub struct ResilientClient<D, Op>
where
    D: Connector,
    Op: RemoteOperation<D::Conn>,
{
    manager: ConnectionManager<D>,
    breaker: Arc<CircuitBreaker>,
    operation: Op,
    retry: Option<RetryConfig>,
}

impl<D, Op> ResilientClient<D, Op>
where
    D: Connector,
    Op: RemoteOperation<D::Conn>,
    Op::Request: Clone,
{
    /// Creates a client for `target`, building the manager, classifier and
    /// breaker from `config`. No dial happens until the first call.
    ///
    /// 为 `target` 创建客户端，根据 `config` 构建连接管理器、分类器与熔断器。
    /// 第一次调用之前不会发生拨号。
    pub fn new(target: impl Into<String>, connector: D, operation: Op, config: Config) -> Self {
        let manager = ConnectionManager::new(target, connector, config.dial);
        let classifier = FailureClassifier::new(&config.classifier);
        let breaker = Arc::new(CircuitBreaker::new(config.breaker, classifier));
        Self {
            manager,
            breaker,
            operation,
            retry: config.retry,
        }
    }

    /// Replaces the retry policy. `None` disables transport-level retries.
    /// 替换重试策略。`None` 表示禁用传输层重试。
    pub fn with_retry(mut self, retry: Option<RetryConfig>) -> Self {
        self.retry = retry;
        self
    }

    /// Establishes (or joins the establishment of) the shared connection
    /// without issuing a call.
    ///
    /// 建立（或加入正在进行的建立过程）共享连接，但不发起调用。
    pub async fn ensure_connection(&self, scope: &CallScope) -> Result<Arc<D::Conn>> {
        self.manager.ensure_connection(scope).await
    }

    /// Issues one remote call through the connection manager and the breaker.
    ///
    /// A dial failure surfaces unchanged and never touches the breaker: a
    /// call that was never attempted is not a call failure. A
    /// [`Error::BreakerOpen`] rejection returns immediately and never
    /// consumes retry budget. Retryable failures (per the classifier) are
    /// re-attempted with jittered exponential backoff, bounded by
    /// `max_attempts` and by the caller's scope.
    ///
    /// 通过连接管理器与熔断器发起一次远程调用。
    ///
    /// 拨号失败原样返回且绝不触及熔断器：从未被尝试的调用不算调用失败。
    /// [`Error::BreakerOpen`] 拒绝立即返回，绝不消耗重试预算。可重试的失败
    /// （由分类器判定）以带抖动的指数退避重试，受 `max_attempts` 与调用方
    /// 范围约束。
    pub async fn call(&self, scope: &CallScope, request: Op::Request) -> Result<Op::Response> {
        let conn = self.manager.ensure_connection(scope).await?;

        let max_attempts = self.retry.as_ref().map_or(1, |r| r.max_attempts.max(1));
        let mut attempt = 1u32;
        loop {
            let result = self
                .breaker
                .execute(|| self.operation.invoke(conn.as_ref(), request.clone()))
                .await;

            let err = match result {
                Ok(response) => return Ok(response),
                Err(Error::BreakerOpen) => return Err(Error::BreakerOpen),
                Err(err) => err,
            };

            let policy = match &self.retry {
                Some(policy) if self.breaker.classifier().is_retryable(&err) => policy,
                _ => return Err(err),
            };
            if attempt >= max_attempts || scope.is_ended() {
                return Err(err);
            }

            let delay = retry::backoff_delay(attempt, policy);
            debug!(attempt, delay = ?delay, error = %err, "retrying call after backoff");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = scope.cancelled() => return Err(Error::CallCanceled),
            }
            attempt += 1;
        }
    }

    /// Closes the underlying connection manager. Idempotent; subsequent
    /// calls fail with [`Error::NotConnected`].
    ///
    /// 关闭底层连接管理器。幂等；之后的调用以 [`Error::NotConnected`] 失败。
    pub async fn close(&self) -> Result<()> {
        self.manager.close().await
    }

    /// The breaker gating this client's calls.
    /// 门控此客户端调用的熔断器。
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The connection manager owning the shared connection.
    /// 持有共享连接的连接管理器。
    pub fn manager(&self) -> &ConnectionManager<D> {
        &self.manager
    }
}

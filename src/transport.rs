//! Traits for abstracting over the underlying transport implementation.
//! 用于对底层传输实现进行抽象的 trait。

use crate::config::DialConfig;
use crate::error::Result;
use crate::scope::CallScope;
use async_trait::async_trait;
use std::sync::Arc;

/// A live transport connection to a remote endpoint.
///
/// This trait allows the connection manager to poll transport readiness and
/// to release the connection without knowing the concrete transport,
/// enabling custom implementations for testing or other purposes.
///
/// 到远端端点的活动传输连接。
///
/// 此trait允许连接管理器在不了解具体传输的情况下轮询传输就绪状态并释放连接，
/// 从而可以为测试或其他目的自定义实现。
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Returns `true` once the connection is ready to carry calls.
    /// 一旦连接准备好承载调用，返回 `true`。
    fn is_ready(&self) -> bool;

    /// Waits until the readiness state changes. Returns `false` if `scope`
    /// ended before any change was observed.
    ///
    /// 等待就绪状态发生变化。如果 `scope` 在观察到任何变化之前结束，返回 `false`。
    async fn wait_for_state_change(&self, scope: &CallScope) -> bool;

    /// Releases the connection and its resources.
    /// 释放连接及其资源。
    async fn close(&self) -> Result<()>;
}

/// A factory for transport connections.
///
/// The connector owns the mechanics of establishing a connection (including
/// applying the configured backoff shape between its internal attempts); the
/// connection manager owns when a dial happens and who shares its result.
///
/// 传输连接的工厂。
///
/// 连接器负责建立连接的机制（包括在其内部尝试之间应用配置的退避形状）；
/// 连接管理器负责决定何时拨号以及谁共享其结果。
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    /// 此连接器产生的连接类型。
    type Conn: Connection;

    /// Establishes a connection to `target`. Bounded by `scope`.
    /// 建立到 `target` 的连接。受 `scope` 约束。
    async fn dial(&self, target: &str, config: &DialConfig, scope: &CallScope)
    -> Result<Self::Conn>;
}

#[async_trait]
impl<T: Connector> Connector for Arc<T> {
    type Conn = T::Conn;

    async fn dial(
        &self,
        target: &str,
        config: &DialConfig,
        scope: &CallScope,
    ) -> Result<Self::Conn> {
        (**self).dial(target, config, scope).await
    }
}

/// One typed remote operation: request in, response or classified error out.
///
/// Implementations return [`Error::CallFailed`](crate::error::Error::CallFailed)
/// with the appropriate [`StatusCode`](crate::error::StatusCode) so the
/// failure classifier and the retry policy can act on the outcome.
///
/// 一个带类型的远程操作：请求进入，返回响应或已分类的错误。
///
/// 实现应返回携带恰当 [`StatusCode`](crate::error::StatusCode) 的
/// [`Error::CallFailed`](crate::error::Error::CallFailed)，以便失败分类器和
/// 重试策略对结果进行处理。
#[async_trait]
pub trait RemoteOperation<C: Send + Sync>: Send + Sync {
    /// The request type of the operation.
    /// 操作的请求类型。
    type Request: Send + 'static;

    /// The response type of the operation.
    /// 操作的响应类型。
    type Response: Send + 'static;

    /// Invokes the operation once over `connection`.
    /// 通过 `connection` 调用该操作一次。
    async fn invoke(&self, connection: &C, request: Self::Request) -> Result<Self::Response>;
}

#[async_trait]
impl<C, T> RemoteOperation<C> for Arc<T>
where
    C: Send + Sync,
    T: RemoteOperation<C>,
{
    type Request = T::Request;
    type Response = T::Response;

    async fn invoke(&self, connection: &C, request: Self::Request) -> Result<Self::Response> {
        (**self).invoke(connection, request).await
    }
}

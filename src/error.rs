//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// A transport status code attached to a failed remote call.
///
/// The set mirrors the vocabulary commonly used by RPC transports. Success is
/// never represented as a code; a successful call returns `Ok(response)`.
///
/// 附加在失败远程调用上的传输状态码。
/// 该集合与RPC传输常用的词汇保持一致。成功从不以状态码表示；成功的调用返回 `Ok(response)`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The remote service is currently unavailable.
    /// 远端服务当前不可用。
    Unavailable,
    /// The remote side has exhausted a resource (e.g. a quota).
    /// 远端资源耗尽（例如配额）。
    ResourceExhausted,
    /// The call's deadline elapsed before the remote side answered.
    /// 在远端应答之前调用的截止时间已到。
    DeadlineExceeded,
    /// The request itself is malformed; retrying cannot help.
    /// 请求本身格式错误；重试无济于事。
    InvalidArgument,
    /// The caller did not present valid credentials.
    /// 调用方未提供有效凭证。
    Unauthenticated,
    /// The caller is authenticated but not allowed to perform the call.
    /// 调用方已认证但无权执行该调用。
    PermissionDenied,
    /// The addressed entity does not exist.
    /// 被寻址的实体不存在。
    NotFound,
    /// The entity the call tried to create already exists.
    /// 调用试图创建的实体已存在。
    AlreadyExists,
    /// The system is not in a state required for the call.
    /// 系统未处于该调用所需的状态。
    FailedPrecondition,
    /// The remote side hit an internal error.
    /// 远端发生内部错误。
    Internal,
    /// An error that fits no other code.
    /// 无法归入其他状态码的错误。
    Unknown,
}

/// The primary error type for the resilient client library.
///
/// Every variant is recoverable: nothing here is fatal to the process, and a
/// future call may succeed. Errors are `Clone` so that a single dial failure
/// can be delivered to every caller waiting on the same in-flight dial.
///
/// 弹性客户端库的主要错误类型。
/// 每个变体都是可恢复的：这里没有任何对进程致命的错误，后续调用可能成功。
/// 错误实现了 `Clone`，以便将同一次拨号失败分发给所有等待该拨号的调用方。
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The transport connection could not be established.
    /// 无法建立传输连接。
    #[error("dial {target} failed: {reason}")]
    DialFailed {
        /// The endpoint that was being dialed.
        /// 正在拨号的端点。
        target: String,
        /// The underlying cause, rendered as text.
        /// 底层原因（文本形式）。
        reason: String,
    },

    /// A call was attempted before any successful dial, or after `close`.
    /// 在任何一次成功拨号之前（或在 `close` 之后）尝试了调用。
    #[error("client is not connected")]
    NotConnected,

    /// The call was rejected without an attempt because the circuit breaker
    /// is open, or half-open with all probe slots taken.
    ///
    /// 由于熔断器处于打开状态（或半开且探测名额已满），调用未经尝试即被拒绝。
    #[error("circuit breaker is open")]
    BreakerOpen,

    /// The remote operation itself failed with a classified status code.
    /// 远程操作本身失败，并带有已分类的状态码。
    #[error("remote call failed with {code:?}: {message}")]
    CallFailed {
        /// The transport status code of the failure.
        /// 失败的传输状态码。
        code: StatusCode,
        /// A human-readable description from the transport.
        /// 来自传输层的可读描述。
        message: String,
    },

    /// The caller's own cancellation/timeout scope ended before the call (or
    /// its wait on a shared dial) completed. The shared work continues for
    /// everyone else.
    ///
    /// 调用方自身的取消/超时范围在调用（或其对共享拨号的等待）完成之前结束。
    /// 共享的工作对其他调用方继续进行。
    #[error("call canceled by the caller's scope")]
    CallCanceled,

    /// An internal completion channel was closed unexpectedly.
    /// 内部完成通道意外关闭。
    #[error("internal channel is broken")]
    ChannelClosed,
}

impl Error {
    /// Returns the transport status code, if this error carries one.
    ///
    /// 返回此错误携带的传输状态码（如果有）。
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::CallFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

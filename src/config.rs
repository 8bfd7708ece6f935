//! 定义了拨号、熔断与重试的可配置参数。
//! Defines configurable parameters for dialing, circuit breaking and retries.

use crate::error::StatusCode;
use std::time::Duration;

/// A structure containing all configurable parameters for a resilient client.
///
/// 包含弹性客户端所有可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Dial and connection-establishment parameters.
    /// 拨号与连接建立参数。
    pub dial: DialConfig,

    /// Circuit breaker parameters.
    /// 熔断器参数。
    pub breaker: BreakerConfig,

    /// Outcome-code classification parameters.
    /// 结果状态码分类参数。
    pub classifier: ClassifierConfig,

    /// Transport-level retry policy. `None` disables retries entirely.
    /// 传输层重试策略。`None` 表示完全禁用重试。
    pub retry: Option<RetryConfig>,
}

/// Dial and connection-establishment parameters.
///
/// The backoff shape is handed to the [`Connector`](crate::transport::Connector)
/// implementation, which applies it between its own connection attempts.
///
/// 拨号与连接建立参数。
/// 退避形状被传递给 [`Connector`](crate::transport::Connector) 实现，由其在
/// 自己的连接尝试之间应用。
#[derive(Debug, Clone)]
pub struct DialConfig {
    /// The delay before the first reconnection attempt.
    /// 第一次重连尝试之前的延迟。
    pub base_delay: Duration,
    /// The multiplier applied to the delay after each failed attempt.
    /// 每次尝试失败后应用于延迟的乘数。
    pub multiplier: f64,
    /// The upper bound on the delay between attempts.
    /// 尝试之间延迟的上限。
    pub max_delay: Duration,
    /// The minimum time allotted to a single connection attempt.
    /// 分配给单次连接尝试的最短时间。
    pub min_connect_timeout: Duration,
}

/// Circuit breaker parameters.
///
/// 熔断器参数。
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// The minimum number of calls in the current window before the failure
    /// rate is evaluated at all.
    /// 在评估失败率之前，当前窗口内所需的最少调用数。
    pub min_requests: u32,
    /// The fraction of failures (0.0..=1.0) at which the breaker trips open.
    /// 使熔断器跳闸的失败比例（0.0..=1.0）。
    pub failure_rate_threshold: f64,
    /// How long the breaker stays open before admitting a probe.
    /// 熔断器在放行探测之前保持打开状态的时长。
    pub open_duration: Duration,
    /// The number of concurrent probe calls admitted while half-open.
    /// 半开状态下允许并发的探测调用数量。
    pub max_half_open_probes: u32,
    /// The period after which the closed-state counts are reset, so that a
    /// blip long in the past cannot combine with a fresh one.
    /// 关闭状态计数的重置周期，避免久远的抖动与新的抖动叠加。
    pub rolling_interval: Duration,
}

/// Outcome-code classification parameters.
///
/// The classification is configuration, not hardwired: deployments may extend
/// or shrink either set without touching breaker or manager logic.
///
/// 结果状态码分类参数。
/// 分类是配置而非硬编码：部署方可以扩展或收缩任一集合，而无需改动熔断器或
/// 连接管理器的逻辑。
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Codes that count toward tripping the breaker.
    /// 计入熔断器跳闸统计的状态码。
    pub failure_codes: Vec<StatusCode>,
    /// Codes eligible for transport-level retry.
    /// 允许传输层重试的状态码。
    pub retryable_codes: Vec<StatusCode>,
}

/// Transport-level retry policy, applied above the breaker by the client
/// facade. Attempts are bounded by the caller's scope.
///
/// 传输层重试策略，由客户端门面在熔断器之上应用。尝试次数受调用方范围约束。
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// The total number of attempts, including the first one.
    /// 总尝试次数（包含第一次）。
    pub max_attempts: u32,
    /// The backoff before the second attempt.
    /// 第二次尝试之前的退避时长。
    pub initial_backoff: Duration,
    /// The upper bound on the backoff between attempts.
    /// 尝试之间退避时长的上限。
    pub max_backoff: Duration,
    /// The multiplier applied to the backoff after each attempt.
    /// 每次尝试后应用于退避时长的乘数。
    pub backoff_multiplier: f64,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            multiplier: 1.6,
            max_delay: Duration::from_secs(5),
            min_connect_timeout: Duration::from_secs(2),
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            min_requests: 10,
            failure_rate_threshold: 0.5,
            open_duration: Duration::from_secs(30),
            max_half_open_probes: 1,
            rolling_interval: Duration::from_secs(30),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            failure_codes: vec![
                StatusCode::Unavailable,
                StatusCode::ResourceExhausted,
                StatusCode::DeadlineExceeded,
            ],
            retryable_codes: vec![StatusCode::Unavailable, StatusCode::ResourceExhausted],
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 1.6,
        }
    }
}

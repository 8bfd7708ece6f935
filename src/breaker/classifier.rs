//! 失败分类器：将调用结果映射为熔断相关的成功/失败。
//! The failure classifier: maps call outcomes to breaker-relevant success/failure.

use crate::config::ClassifierConfig;
use crate::error::{Error, Result, StatusCode};
use std::collections::HashSet;

/// How an outcome is recorded by the breaker.
///
/// 熔断器记录结果的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Counts as a success: the remote is not to blame for this outcome.
    /// 计为成功：该结果不应归咎于远端。
    Success,
    /// Counts toward tripping the breaker.
    /// 计入熔断器跳闸统计。
    Failure,
}

/// A pure mapping from transport outcomes to breaker accounting.
///
/// Transport-availability codes count as failures. Caller-fault codes (an
/// invalid argument, missing credentials) count as successes: repeating the
/// same bad call will fail regardless of remote health and must not trip the
/// breaker. Errors carrying no status code count as failures, since nothing
/// proves the caller is at fault.
///
/// 从传输结果到熔断记账的纯映射。
///
/// 传输可用性相关的状态码计为失败。调用方过错的状态码（参数无效、缺少凭证）
/// 计为成功：重复同样的错误调用无论远端是否健康都会失败，不应使熔断器跳闸。
/// 不携带状态码的错误计为失败，因为无法证明是调用方的过错。
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    failure_codes: HashSet<StatusCode>,
    retryable_codes: HashSet<StatusCode>,
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl FailureClassifier {
    /// Builds a classifier from the configured code sets.
    /// 根据配置的状态码集合构建分类器。
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            failure_codes: config.failure_codes.iter().copied().collect(),
            retryable_codes: config.retryable_codes.iter().copied().collect(),
        }
    }

    /// Classifies a call result for breaker accounting.
    /// 为熔断记账对调用结果进行分类。
    pub fn classify<T>(&self, result: &Result<T>) -> Outcome {
        match result {
            Ok(_) => Outcome::Success,
            Err(err) => match err.status_code() {
                Some(code) if self.failure_codes.contains(&code) => Outcome::Failure,
                Some(_) => Outcome::Success,
                None => Outcome::Failure,
            },
        }
    }

    /// Whether the error is eligible for a transport-level retry.
    /// 该错误是否允许传输层重试。
    pub fn is_retryable(&self, err: &Error) -> bool {
        err.status_code()
            .is_some_and(|code| self.retryable_codes.contains(&code))
    }
}

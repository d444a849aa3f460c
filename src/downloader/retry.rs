//! 带退避的重试策略
//!
//! 把重试从具体的网络调用中拆出来：`RetryPolicy` 只关心尝试次数与等待时间，
//! 错误是否值得重试由 [`IsRetryable`] 决定。

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

use crate::config::RetryConfig;

/// 判断错误是否为临时性错误
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// 总尝试次数，至少为 1
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// 第 `retry` 次重试前的等待时间（从 0 开始计数，不含抖动），不超过 `max_delay`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.config.backoff_multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        self.capped(self.config.initial_delay.as_secs_f64() * factor)
    }

    // 先在浮点域里截断，过大的值不会进入 Duration 转换
    fn capped(&self, secs: f64) -> Duration {
        let max = self.config.max_delay;
        if secs.is_nan() || secs >= max.as_secs_f64() {
            return max;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(max)
    }

    /// 执行操作，遇到可重试错误时按退避间隔重试，直到用完尝试次数。
    /// 闭包参数为从 0 开始的尝试序号。
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsRetryable + std::fmt::Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(attempts = attempt + 1, "重试后成功");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.jittered(attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "操作失败，等待后重试"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!(error = %e, attempts = attempt + 1, "重试次数已用完");
                    } else {
                        warn!(error = %e, "不可重试的错误");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// 带抖动的等待时间，抖动后同样受 `max_delay` 限制
    fn jittered(&self, retry: u32) -> Duration {
        let delay = self.delay_for(retry);
        if !self.config.jitter || delay.is_zero() {
            return delay;
        }
        let factor: f64 = rand::rng().random_range(0.0..=1.0);
        self.capped(delay.as_secs_f64() * (1.0 + factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient error"),
                TestError::Permanent => write!(f, "permanent error"),
            }
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: true,
        })
    }

    #[tokio::test]
    async fn test_persistent_failure_stops_at_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), TestError> = fast_policy(4)
            .run(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Transient)
                }
            })
            .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), TestError> = fast_policy(5)
            .run(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Permanent)
                }
            })
            .await;

        assert!(matches!(result, Err(TestError::Permanent)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let result: Result<u32, TestError> = fast_policy(3)
            .run(|attempt| async move {
                if attempt < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let _: Result<(), TestError> = fast_policy(0)
            .run(|_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Transient)
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
        });
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_for_late_retries_stays_at_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 100,
            ..RetryConfig::default()
        });
        let max_delay = RetryConfig::default().max_delay;
        assert_eq!(policy.delay_for(64), max_delay);
        assert_eq!(policy.delay_for(u32::MAX), max_delay);
    }

    #[test]
    fn test_jitter_never_exceeds_max_delay() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        });
        for retry in 0..20 {
            assert!(policy.jittered(retry) <= Duration::from_secs(5));
        }
        assert!(policy.jittered(0) >= Duration::from_secs(4));
    }

    #[test]
    fn test_fixed_delay_with_unit_multiplier() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.0,
            jitter: false,
        });
        assert_eq!(policy.delay_for(0), Duration::from_secs(3));
        assert_eq!(policy.delay_for(4), Duration::from_secs(3));
    }
}

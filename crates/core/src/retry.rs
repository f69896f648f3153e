use std::future::Future;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::errors::MarketResult;

/// 对可重试错误（资源争用、数据库故障）执行指数退避重试
///
/// 业务规则拒绝会立即返回。`operation` 每次尝试都会被重新调用，
/// 因此每次尝试都是一个独立的事务。
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> MarketResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MarketResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} 在第 {} 次尝试后成功", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                let delay = config.delay_for(attempt);
                warn!(
                    "{} 第 {} 次尝试失败，{}ms 后重试: {}",
                    operation_name,
                    attempt,
                    delay.as_millis(),
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MarketError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retries_contention_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(&fast_config(3), "claim", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(MarketError::contention("row locked"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: MarketResult<()> = retry_with_backoff(&fast_config(2), "claim", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(MarketError::contention("row locked"))
            }
        })
        .await;

        assert!(matches!(result, Err(MarketError::Contention(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_domain_rejection_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: MarketResult<()> = retry_with_backoff(&fast_config(5), "claim", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(MarketError::AlreadyTaken { order_id: 7 })
            }
        })
        .await;

        assert!(matches!(result, Err(MarketError::AlreadyTaken { order_id: 7 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

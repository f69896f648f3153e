use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 资源争用时的重试策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// 第 `attempt` 次重试（从1开始）前的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis((delay as u64).min(self.max_delay_ms))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(anyhow::anyhow!("基础延迟不能大于最大延迟"));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!("退避倍数不能小于1.0"));
        }

        Ok(())
    }
}

use serde::{Deserialize, Serialize};

/// 订单封禁生命周期配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// 是否启用周期性自动解封
    pub sweep_enabled: bool,
    pub sweep_interval_seconds: u64,
    /// 封禁时未指定截止时间时使用的默认天数
    pub default_block_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_enabled: true,
            sweep_interval_seconds: 3600,
            default_block_days: 30,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sweep_enabled && self.sweep_interval_seconds == 0 {
            return Err(anyhow::anyhow!("自动解封间隔必须大于0"));
        }

        if self.default_block_days <= 0 {
            return Err(anyhow::anyhow!("默认封禁天数必须大于0"));
        }

        Ok(())
    }
}

/// 价格审计日志写入配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            queue_capacity: 1024,
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            return Err(anyhow::anyhow!("审计日志工作线程数必须大于0"));
        }

        if self.queue_capacity == 0 {
            return Err(anyhow::anyhow!("审计日志队列容量必须大于0"));
        }

        Ok(())
    }
}

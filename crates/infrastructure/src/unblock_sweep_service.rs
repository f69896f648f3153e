use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gigmarket_core::{LifecycleConfig, MarketResult};
use gigmarket_domain::{OrderLifecycleService, SweepReport};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// 周期性自动解封服务
///
/// 单个后台任务按固定间隔执行，上一轮未结束时不会开始下一轮。
pub struct UnblockSweepService {
    lifecycle: Arc<OrderLifecycleService>,
    config: LifecycleConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    sweep_handle: Option<JoinHandle<()>>,
}

impl UnblockSweepService {
    pub fn new(lifecycle: Arc<OrderLifecycleService>, config: LifecycleConfig) -> Self {
        Self {
            lifecycle,
            config,
            shutdown_tx: None,
            sweep_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.sweep_handle.is_some()
    }

    /// 启动周期任务，第一次执行发生在一个间隔之后
    pub fn start(&mut self) {
        if !self.config.sweep_enabled {
            info!("自动解封服务未启用");
            return;
        }
        if self.is_running() {
            warn!("自动解封服务已在运行");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let lifecycle = self.lifecycle.clone();
        let period = Duration::from_secs(self.config.sweep_interval_seconds);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = lifecycle.auto_unblock_sweep(Utc::now()).await {
                            error!("自动解封失败: {}", e);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("收到自动解封服务停止请求");
                        break;
                    }
                }
            }
        });

        self.sweep_handle = Some(handle);
        info!(
            "自动解封服务已启动，间隔 {} 秒",
            self.config.sweep_interval_seconds
        );
    }

    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(handle) = self.sweep_handle.take() {
            if let Err(e) = handle.await {
                warn!("等待自动解封服务停止时出错: {}", e);
            }
        }

        info!("自动解封服务已停止");
    }

    /// 立即执行一次，启动时调用
    pub async fn sweep_once(&self) -> MarketResult<SweepReport> {
        self.lifecycle.auto_unblock_sweep(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigmarket_testing_utils::{OrderBuilder, TestEnv, TestServices};

    #[tokio::test]
    async fn test_sweep_once_clears_expired_blocks() {
        let services = TestServices::seeded();
        services.market.insert_order(
            OrderBuilder::new()
                .with_id(1)
                .blocked_until(Utc::now() - chrono::Duration::minutes(5))
                .build(),
        );

        let service = UnblockSweepService::new(services.lifecycle.clone(), LifecycleConfig::default());
        let report = service.sweep_once().await.unwrap();
        assert_eq!(report.orders, 1);
        assert!(!services.market.order(1).unwrap().is_blocked);
    }

    #[tokio::test]
    async fn test_periodic_sweep_runs_until_stopped() {
        let services = TestServices::seeded();
        let config = LifecycleConfig {
            sweep_interval_seconds: 1,
            ..LifecycleConfig::default()
        };
        let mut service = UnblockSweepService::new(services.lifecycle.clone(), config);
        service.start();
        assert!(service.is_running());

        services.market.insert_order(
            OrderBuilder::new()
                .with_id(1)
                .blocked_until(Utc::now() - chrono::Duration::minutes(5))
                .build(),
        );
        let market = services.market.clone();
        let cleared = TestEnv::wait_for(
            || {
                let market = market.clone();
                async move { market.order(1).is_some_and(|order| !order.is_blocked) }
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(cleared);

        service.stop().await;
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_disabled_service_does_not_start() {
        let services = TestServices::seeded();
        let config = LifecycleConfig {
            sweep_enabled: false,
            ..LifecycleConfig::default()
        };
        let mut service = UnblockSweepService::new(services.lifecycle.clone(), config);
        service.start();
        assert!(!service.is_running());
        service.stop().await;
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use gigmarket_core::AuditConfig;
use gigmarket_domain::{AuditLogRepository, OrderAuditLog, PriceEvent};
use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<PriceEvent>>>;

/// 价格审计日志的异步写入器
///
/// `record` 只把事件放进有界队列，由固定数量的后台任务写库。
/// 队列已满或已关闭时丢弃事件，写入失败只记录日志。
pub struct AuditLogWorker {
    sender: Mutex<Option<mpsc::Sender<PriceEvent>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl AuditLogWorker {
    /// 启动写入任务，必须在 tokio 运行时内调用
    pub fn start(repository: Arc<dyn AuditLogRepository>, config: &AuditConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver: SharedReceiver = Arc::new(AsyncMutex::new(receiver));

        let handles = (0..config.workers.max(1))
            .map(|worker_id| {
                let repository = repository.clone();
                let receiver = receiver.clone();
                tokio::spawn(Self::run_worker(worker_id, repository, receiver))
            })
            .collect();

        info!(
            "审计日志写入器已启动: {} 个工作任务，队列容量 {}",
            config.workers, config.queue_capacity
        );
        Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
            dropped: AtomicU64::new(0),
        }
    }

    async fn run_worker(
        worker_id: usize,
        repository: Arc<dyn AuditLogRepository>,
        receiver: SharedReceiver,
    ) {
        loop {
            let next = receiver.lock().await.recv().await;
            let Some(event) = next else {
                break;
            };
            if let Err(e) = repository.insert(&event).await {
                counter!("gigmarket_audit_events_failed_total").increment(1);
                error!(
                    worker_id = worker_id,
                    order_id = event.order_id,
                    "写入审计日志失败: {}",
                    e
                );
            }
        }
        debug!("审计日志工作任务 {} 已退出", worker_id);
    }

    /// 因队列满或已关闭而丢弃的事件数
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn drop_event(&self, event: &PriceEvent, reason: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        counter!("gigmarket_audit_events_dropped_total").increment(1);
        warn!(
            order_id = event.order_id,
            kind = event.kind.as_str(),
            "审计事件被丢弃: {}",
            reason
        );
    }

    /// 关闭队列并等待已排队的事件写完
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("等待审计日志工作任务退出时出错: {}", e);
            }
        }
        info!("审计日志写入器已停止");
    }
}

impl OrderAuditLog for AuditLogWorker {
    fn record(&self, event: PriceEvent) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            self.drop_event(&event, "写入器已关闭");
            return;
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => self.drop_event(&event, "队列已满"),
            Err(TrySendError::Closed(event)) => self.drop_event(&event, "队列已关闭"),
        }
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use gigmarket_api::{create_app, AppState};
use gigmarket_core::AppConfig;
use gigmarket_domain::{
    AssignmentService, EligibilityService, OrderAuditLog, OrderLifecycleService, TeamRegistry,
};
use gigmarket_infrastructure::{AuditLogWorker, DatabaseManager, UnblockSweepService};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info, warn};

/// 主应用程序，持有数据库、领域服务和后台任务
pub struct Application {
    config: AppConfig,
    database: Arc<DatabaseManager>,
    audit: Arc<AuditLogWorker>,
    state: AppState,
}

impl Application {
    pub async fn new(config: AppConfig, metrics: Option<PrometheusHandle>) -> Result<Self> {
        info!("连接数据库: {}", mask_database_url(&config.database.url));
        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        database
            .initialize_schema()
            .await
            .context("初始化数据库表结构失败")?;
        info!("数据库连接成功: {:?}", database.database_type());

        let orders = database.order_repository();
        let users = database.user_directory();
        let catalog = database.speciality_catalog();

        let audit = Arc::new(AuditLogWorker::start(
            database.audit_log_repository(),
            &config.audit,
        ));
        let audit_log: Arc<dyn OrderAuditLog> = audit.clone();

        let teams = Arc::new(TeamRegistry::new(database.team_repository(), users.clone()));
        let eligibility = Arc::new(EligibilityService::new(
            orders.clone(),
            users.clone(),
            catalog.clone(),
        ));
        let assignment = Arc::new(AssignmentService::new(
            orders.clone(),
            users.clone(),
            catalog,
            teams.clone(),
        ));
        let lifecycle = Arc::new(OrderLifecycleService::new(
            orders,
            users,
            audit_log,
            config.lifecycle.default_block_days,
        ));

        let state = AppState {
            eligibility,
            assignment,
            teams,
            lifecycle,
            retry: config.retry.clone(),
            metrics,
        };

        Ok(Self {
            config,
            database: Arc::new(database),
            audit,
            state,
        })
    }

    /// 运行到收到关闭信号为止，然后依次停止后台任务并关闭连接池
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut sweeper =
            UnblockSweepService::new(self.state.lifecycle.clone(), self.config.lifecycle.clone());
        match sweeper.sweep_once().await {
            Ok(report) => info!(
                "启动时自动解封完成: 订单 {} 个，用户 {} 个",
                report.orders, report.users
            ),
            Err(e) => warn!("启动时自动解封失败: {}", e),
        }
        sweeper.start();

        let result = if self.config.api.enabled {
            self.run_api(shutdown_rx).await
        } else {
            info!("API服务器未启用，仅运行后台任务");
            let _ = shutdown_rx.recv().await;
            Ok(())
        };

        sweeper.stop().await;
        self.audit.shutdown().await;
        if self.audit.dropped_count() > 0 {
            warn!("运行期间共丢弃 {} 条审计事件", self.audit.dropped_count());
        }
        self.database.close().await;
        info!("数据库连接已关闭");

        result
    }

    async fn run_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = &self.config.api.bind_address;
        let app = create_app(self.state.clone(), &self.config.api);

        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", bind_address))?;
        info!("API服务器启动在 http://{}", bind_address);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await;

        if let Err(e) = served {
            error!("API服务器运行失败: {}", e);
            return Err(e).context("API服务器运行失败");
        }
        info!("API服务器已停止");
        Ok(())
    }
}

/// 屏蔽数据库URL中的密码
fn mask_database_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if url[..colon_pos].ends_with('/') {
                return url.to_string();
            }
            let mut masked = url.to_string();
            masked.replace_range(colon_pos + 1..at_pos, "***");
            return masked;
        }
    }
    url.to_string()
}

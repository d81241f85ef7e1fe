//! 行程通知 Worker
//!
//! 轮询到期的定时通知并发送。推送凭据缺失时以禁用状态运行，只做空轮询。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aura_shared::{cache::Cache, config::AppConfig, database::Database, observability};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use trip_notification::{
    DeviceRegistry, Dispatcher, Scheduler, TemplateEngine,
    repository::{
        DeviceTokenRepository, NotificationHistoryRepository, ScheduledNotificationRepository,
    },
    worker::{RedisPollLease, ScheduledNotificationWorker},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load("trip-notification-worker").unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 2. 初始化可观测性
    let _guard = observability::init(&config.observability).await?;

    info!("Starting trip-notification-worker...");
    info!(environment = %config.environment, "Configuration loaded");

    // 3. 初始化数据库连接并执行迁移
    let db = Database::connect(&config.database).await?;
    db.health_check().await?;
    db.run_migrations().await?;
    let pool = db.pool().clone();
    info!("Database connection established");

    // 4. 初始化 Redis
    let cache = Cache::new(&config.redis)?;
    cache.health_check().await?;
    info!("Redis connection established");

    // 5. 组装服务
    let registry = DeviceRegistry::new(Arc::new(DeviceTokenRepository::new(pool.clone())));
    let templates = Arc::new(TemplateEngine::with_defaults(
        &config.notification.default_language,
    ));
    let dispatcher = Dispatcher::from_config(
        &config.push,
        registry,
        templates,
        Arc::new(NotificationHistoryRepository::new(pool.clone())),
    );
    let scheduler = Scheduler::new(
        dispatcher,
        Arc::new(ScheduledNotificationRepository::new(pool.clone())),
        config.scheduler.batch_size,
    );

    let lease = Arc::new(RedisPollLease::new(
        cache,
        Duration::from_secs(config.scheduler.lease_ttl_seconds),
    ));
    let worker = ScheduledNotificationWorker::new(scheduler, lease, &config.scheduler);

    // 6. 启动轮询，等待关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Err(e) = worker_handle.await {
        error!(error = %e, "Worker task terminated abnormally");
    }

    db.close().await;
    info!("Service shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM 信号，用于 Kubernetes 优雅关闭
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}

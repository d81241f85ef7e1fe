//! PostgreSQL 连接与迁移
//!
//! 设备令牌、定时通知、发送历史都保存在同一个库中，
//! 迁移脚本位于工作区根目录 `migrations/`，编译期嵌入二进制。

use crate::config::DatabaseConfig;
use crate::error::{AuraError, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// 连接池参数
fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
}

/// 去掉连接串中的密码，用于日志
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}

/// 数据库连接池包装
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 建立连接池
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(url = %redact_url(&config.url), "Connecting to database...");

        let pool = pool_options(config).connect(&config.url).await?;

        info!(
            max_connections = config.max_connections,
            "Database connection pool created"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 启动时确认数据库可用
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }

    /// 执行尚未应用的迁移
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        info!(available = MIGRATOR.iter().count(), "Running database migrations...");
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AuraError::Internal(format!("数据库迁移失败: {e}")))?;
        info!("Database migrations completed");
        Ok(())
    }
}

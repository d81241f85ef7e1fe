//! 定时通知轮询 Worker
//!
//! 周期执行到期扫描。多实例部署时通过 Redis 租约保证同一时刻只有一个实例在扫描，
//! 避免重复发送。每条通知发送前续期租约，续期失败说明租约已被其他实例取得，立即停止扫描。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aura_shared::cache::Cache;
use aura_shared::config::SchedulerConfig;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::scheduler::{ProcessSummary, ScanGuard, Scheduler};

/// 轮询租约名称
pub const LEASE_NAME: &str = "scheduled-notifications";

/// 轮询租约
///
/// 获取成功的实例在租约有效期内独占到期扫描
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PollLease: Send + Sync {
    async fn try_acquire(&self, owner: &str) -> Result<bool>;
    /// 延长租约，返回 false 表示租约已不属于 owner
    async fn renew(&self, owner: &str) -> Result<bool>;
    async fn release(&self, owner: &str) -> Result<()>;
}

/// 基于 Redis `SET NX PX` 的租约
pub struct RedisPollLease {
    cache: Cache,
    ttl: Duration,
}

impl RedisPollLease {
    pub fn new(cache: Cache, ttl: Duration) -> Self {
        Self { cache, ttl }
    }
}

#[async_trait]
impl PollLease for RedisPollLease {
    async fn try_acquire(&self, owner: &str) -> Result<bool> {
        Ok(self.cache.try_acquire_lease(LEASE_NAME, owner, self.ttl).await?)
    }

    async fn renew(&self, owner: &str) -> Result<bool> {
        Ok(self.cache.renew_lease(LEASE_NAME, owner, self.ttl).await?)
    }

    async fn release(&self, owner: &str) -> Result<()> {
        Ok(self.cache.release_lease(LEASE_NAME, owner).await?)
    }
}

/// 扫描期间逐条续期租约
struct LeaseScanGuard<'a> {
    lease: &'a dyn PollLease,
    owner: &'a str,
}

#[async_trait]
impl ScanGuard for LeaseScanGuard<'_> {
    async fn should_continue(&self) -> bool {
        match self.lease.renew(self.owner).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(owner = %self.owner, "轮询租约已丢失，停止本轮扫描");
                false
            }
            Err(e) => {
                warn!(error = %e, "续期轮询租约失败，停止本轮扫描");
                false
            }
        }
    }
}

/// 定时通知轮询 Worker
pub struct ScheduledNotificationWorker {
    scheduler: Scheduler,
    lease: Arc<dyn PollLease>,
    poll_interval: Duration,
    /// 租约持有者标识，每个进程唯一
    owner: String,
}

impl ScheduledNotificationWorker {
    pub fn new(scheduler: Scheduler, lease: Arc<dyn PollLease>, config: &SchedulerConfig) -> Self {
        Self {
            scheduler,
            lease,
            poll_interval: Duration::from_secs(config.poll_interval_seconds.max(1)),
            owner: format!("trip-notification-worker:{}", Uuid::new_v4()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// 主循环：按间隔轮询直到收到关闭信号
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.poll_interval,
            owner = %self.owner,
            "ScheduledNotificationWorker 已启动"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("收到关闭信号，定时通知轮询退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "定时通知轮询出错");
                    }
                }
            }
        }
    }

    /// 执行一次轮询
    ///
    /// 未获得租约时返回 None
    pub async fn run_once(&self) -> Result<Option<ProcessSummary>> {
        if !self.lease.try_acquire(&self.owner).await? {
            debug!("租约由其他实例持有，跳过本轮扫描");
            return Ok(None);
        }

        let guard = LeaseScanGuard {
            lease: self.lease.as_ref(),
            owner: &self.owner,
        };
        let result = self
            .scheduler
            .process_due_guarded(Utc::now(), &guard)
            .await;

        if let Err(e) = self.lease.release(&self.owner).await {
            warn!(error = %e, "释放轮询租约失败，等待租约过期");
        }

        result.map(Some)
    }
}

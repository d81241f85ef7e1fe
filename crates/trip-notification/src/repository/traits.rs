//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    DeviceRegistration, DeviceToken, DueCursor, NotificationHistory, ScheduledNotification,
};

/// 设备令牌仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceTokenRepositoryTrait: Send + Sync {
    /// 按 (user_id, platform) 插入或更新，并置为活跃
    async fn upsert(&self, registration: &DeviceRegistration) -> Result<DeviceToken>;
    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<DeviceToken>>;
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<DeviceToken>>;
    /// 停用所有匹配的令牌，返回受影响行数
    async fn deactivate_token(&self, token: &str) -> Result<u64>;
}

/// 定时通知仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduledNotificationRepositoryTrait: Send + Sync {
    async fn insert(&self, notification: &ScheduledNotification) -> Result<()>;
    /// 按 (计划时间, id) 升序列出已到期的通知
    ///
    /// `after` 不为空时只返回排在该位置之后的条目，用于跳过本次扫描中已处理的页
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: i64,
    ) -> Result<Vec<ScheduledNotification>>;
    /// 删除定时通知，返回是否存在
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ScheduledNotification>>;
}

/// 发送历史仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationHistoryRepositoryTrait: Send + Sync {
    async fn record(&self, history: &NotificationHistory) -> Result<()>;
    /// 按发送时间倒序列出
    async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<NotificationHistory>>;
}

/// 行程成员仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TripMemberRepositoryTrait: Send + Sync {
    async fn list_member_ids(&self, trip_id: &str) -> Result<Vec<String>>;
}

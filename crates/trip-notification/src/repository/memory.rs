//! 内存仓储
//!
//! 使用 DashMap 实现的并发安全内存存储，适用于测试和本地开发环境。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::traits::{
    DeviceTokenRepositoryTrait, NotificationHistoryRepositoryTrait,
    ScheduledNotificationRepositoryTrait, TripMemberRepositoryTrait,
};
use crate::error::Result;
use crate::models::{
    DeviceRegistration, DeviceToken, DueCursor, NotificationHistory, Platform,
    ScheduledNotification,
};

/// 内存设备令牌仓储，按 (user_id, platform) 存储
#[derive(Debug, Default, Clone)]
pub struct MemoryDeviceTokenRepository {
    data: Arc<DashMap<(String, Platform), DeviceToken>>,
}

impl MemoryDeviceTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceTokenRepositoryTrait for MemoryDeviceTokenRepository {
    async fn upsert(&self, registration: &DeviceRegistration) -> Result<DeviceToken> {
        let now = Utc::now();
        let key = (registration.user_id.clone(), registration.platform);

        let mut entry = self.data.entry(key).or_insert_with(|| DeviceToken {
            user_id: registration.user_id.clone(),
            token: registration.token.clone(),
            platform: registration.platform,
            language: registration.language.clone(),
            timezone: registration.timezone.clone(),
            active: true,
            last_used_at: now,
            created_at: now,
        });

        let token = entry.value_mut();
        token.token = registration.token.clone();
        token.language = registration.language.clone();
        token.timezone = registration.timezone.clone();
        token.active = true;
        token.last_used_at = now;

        Ok(token.clone())
    }

    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        Ok(self
            .data
            .iter()
            .filter(|e| e.user_id == user_id && e.active)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        let mut tokens: Vec<DeviceToken> = self
            .data
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        tokens.sort_by_key(|t| t.created_at);
        Ok(tokens)
    }

    async fn deactivate_token(&self, token: &str) -> Result<u64> {
        let mut affected = 0;
        for mut entry in self.data.iter_mut() {
            if entry.token == token && entry.active {
                entry.active = false;
                affected += 1;
            }
        }
        Ok(affected)
    }
}

/// 内存定时通知仓储
#[derive(Debug, Default, Clone)]
pub struct MemoryScheduledNotificationRepository {
    data: Arc<DashMap<Uuid, ScheduledNotification>>,
}

impl MemoryScheduledNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的定时通知数量
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl ScheduledNotificationRepositoryTrait for MemoryScheduledNotificationRepository {
    async fn insert(&self, notification: &ScheduledNotification) -> Result<()> {
        self.data.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: i64,
    ) -> Result<Vec<ScheduledNotification>> {
        let mut due: Vec<ScheduledNotification> = self
            .data
            .iter()
            .filter(|e| e.is_due(now) && after.is_none_or(|c| e.cursor() > c))
            .map(|e| e.value().clone())
            .collect();
        due.sort_by_key(|n| (n.scheduled_at, n.id));
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.data.remove(&id).is_some())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ScheduledNotification>> {
        let mut rows: Vec<ScheduledNotification> = self
            .data
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|n| (n.scheduled_at, n.id));
        Ok(rows)
    }
}

/// 内存发送历史仓储
#[derive(Debug, Default, Clone)]
pub struct MemoryNotificationHistoryRepository {
    data: Arc<DashMap<Uuid, NotificationHistory>>,
}

impl MemoryNotificationHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationHistoryRepositoryTrait for MemoryNotificationHistoryRepository {
    async fn record(&self, history: &NotificationHistory) -> Result<()> {
        self.data.insert(history.id, history.clone());
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<NotificationHistory>> {
        let mut rows: Vec<NotificationHistory> = self
            .data
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        // UUID v7 按时间递增，作为同一时刻的次序
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.id.cmp(&a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

/// 内存行程成员仓储
#[derive(Debug, Default, Clone)]
pub struct MemoryTripMemberRepository {
    data: Arc<DashMap<String, Vec<String>>>,
}

impl MemoryTripMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, trip_id: &str, user_id: &str) {
        let mut members = self.data.entry(trip_id.to_string()).or_default();
        if !members.iter().any(|m| m == user_id) {
            members.push(user_id.to_string());
        }
    }
}

#[async_trait]
impl TripMemberRepositoryTrait for MemoryTripMemberRepository {
    async fn list_member_ids(&self, trip_id: &str) -> Result<Vec<String>> {
        Ok(self
            .data
            .get(trip_id)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }
}

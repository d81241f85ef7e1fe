//! 定时通知仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::traits::ScheduledNotificationRepositoryTrait;
use crate::error::Result;
use crate::models::{DueCursor, ScheduledNotification};

/// 定时通知仓储
pub struct ScheduledNotificationRepository {
    pool: PgPool,
}

impl ScheduledNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, notification: &ScheduledNotification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_notifications (id, user_id, scheduled_at, payload, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(notification.scheduled_at)
        .bind(Json(&notification.payload))
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 列出到期的定时通知，`after` 为上一页最后一条的位置
    pub async fn list_due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: i64,
    ) -> Result<Vec<ScheduledNotification>> {
        let rows = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT id, user_id, scheduled_at, payload, created_at
            FROM scheduled_notifications
            WHERE scheduled_at <= $1
              AND ($2::timestamptz IS NULL OR (scheduled_at, id) > ($2::timestamptz, $3::uuid))
            ORDER BY scheduled_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(now)
        .bind(after.map(|c| c.scheduled_at))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduled_notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 列出用户尚未发送的定时通知
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<ScheduledNotification>> {
        let rows = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT id, user_id, scheduled_at, payload, created_at
            FROM scheduled_notifications
            WHERE user_id = $1
            ORDER BY scheduled_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl ScheduledNotificationRepositoryTrait for ScheduledNotificationRepository {
    async fn insert(&self, notification: &ScheduledNotification) -> Result<()> {
        self.insert(notification).await
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: i64,
    ) -> Result<Vec<ScheduledNotification>> {
        self.list_due(now, after, limit).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.delete(id).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ScheduledNotification>> {
        self.list_by_user(user_id).await
    }
}

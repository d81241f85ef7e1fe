//! 发送历史仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::NotificationHistoryRepositoryTrait;
use crate::error::Result;
use crate::models::NotificationHistory;

/// 发送历史仓储
pub struct NotificationHistoryRepository {
    pool: PgPool,
}

impl NotificationHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, history: &NotificationHistory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_history (
                id, user_id, trip_id, kind, title, body, sent_at, success_count, failure_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(history.id)
        .bind(&history.user_id)
        .bind(&history.trip_id)
        .bind(history.kind)
        .bind(&history.title)
        .bind(&history.body)
        .bind(history.sent_at)
        .bind(history.success_count)
        .bind(history.failure_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<NotificationHistory>> {
        let rows = sqlx::query_as::<_, NotificationHistory>(
            r#"
            SELECT id, user_id, trip_id, kind, title, body, sent_at, success_count, failure_count
            FROM notification_history
            WHERE user_id = $1
            ORDER BY sent_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl NotificationHistoryRepositoryTrait for NotificationHistoryRepository {
    async fn record(&self, history: &NotificationHistory) -> Result<()> {
        self.record(history).await
    }

    async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<NotificationHistory>> {
        self.list_by_user(user_id, limit).await
    }
}

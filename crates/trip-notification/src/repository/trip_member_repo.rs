//! 行程成员仓储
//!
//! 只读访问行程系统维护的 trip_members 表

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::TripMemberRepositoryTrait;
use crate::error::Result;

pub struct TripMemberRepository {
    pool: PgPool,
}

impl TripMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_member_ids(&self, trip_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id
            FROM trip_members
            WHERE trip_id = $1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl TripMemberRepositoryTrait for TripMemberRepository {
    async fn list_member_ids(&self, trip_id: &str) -> Result<Vec<String>> {
        self.list_member_ids(trip_id).await
    }
}

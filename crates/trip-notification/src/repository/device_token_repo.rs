//! 设备令牌仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::DeviceTokenRepositoryTrait;
use crate::error::Result;
use crate::models::{DeviceRegistration, DeviceToken};

/// 设备令牌仓储
pub struct DeviceTokenRepository {
    pool: PgPool,
}

impl DeviceTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 登记设备令牌
    ///
    /// 同一用户同一平台只保留一行，重复登记会刷新令牌、语言、时区和 last_used_at
    pub async fn upsert(&self, registration: &DeviceRegistration) -> Result<DeviceToken> {
        let token = sqlx::query_as::<_, DeviceToken>(
            r#"
            INSERT INTO device_tokens (
                user_id, token, platform, language, timezone, active, last_used_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, TRUE, NOW(), NOW())
            ON CONFLICT (user_id, platform) DO UPDATE SET
                token = EXCLUDED.token,
                language = EXCLUDED.language,
                timezone = EXCLUDED.timezone,
                active = TRUE,
                last_used_at = NOW()
            RETURNING user_id, token, platform, language, timezone, active,
                      last_used_at, created_at
            "#,
        )
        .bind(&registration.user_id)
        .bind(&registration.token)
        .bind(registration.platform)
        .bind(&registration.language)
        .bind(&registration.timezone)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    /// 列出用户的活跃令牌
    pub async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        let tokens = sqlx::query_as::<_, DeviceToken>(
            r#"
            SELECT user_id, token, platform, language, timezone, active,
                   last_used_at, created_at
            FROM device_tokens
            WHERE user_id = $1 AND active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    /// 列出用户的全部令牌（含已停用）
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        let tokens = sqlx::query_as::<_, DeviceToken>(
            r#"
            SELECT user_id, token, platform, language, timezone, active,
                   last_used_at, created_at
            FROM device_tokens
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    /// 停用令牌
    pub async fn deactivate_token(&self, token: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE device_tokens
            SET active = FALSE
            WHERE token = $1 AND active = TRUE
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DeviceTokenRepositoryTrait for DeviceTokenRepository {
    async fn upsert(&self, registration: &DeviceRegistration) -> Result<DeviceToken> {
        self.upsert(registration).await
    }

    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        self.list_active_by_user(user_id).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        self.list_by_user(user_id).await
    }

    async fn deactivate_token(&self, token: &str) -> Result<u64> {
        self.deactivate_token(token).await
    }
}

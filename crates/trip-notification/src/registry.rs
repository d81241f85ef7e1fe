//! 设备令牌登记
//!
//! 维护用户与推送令牌的对应关系。令牌只会被停用，从不物理删除。

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::{NotificationError, Result};
use crate::models::{DeviceRegistration, DeviceToken};
use crate::repository::DeviceTokenRepositoryTrait;

/// 设备令牌登记服务
#[derive(Clone)]
pub struct DeviceRegistry {
    repo: Arc<dyn DeviceTokenRepositoryTrait>,
}

impl DeviceRegistry {
    pub fn new(repo: Arc<dyn DeviceTokenRepositoryTrait>) -> Self {
        Self { repo }
    }

    /// 登记设备令牌
    ///
    /// 同一用户同一平台重复登记会覆盖旧令牌并重新激活；
    /// 不同平台会各自保留一行。存储错误直接返回给调用方。
    #[instrument(skip(self, registration), fields(user_id = %registration.user_id, platform = registration.platform.as_str()))]
    pub async fn register(&self, registration: DeviceRegistration) -> Result<DeviceToken> {
        if registration.user_id.trim().is_empty() {
            return Err(NotificationError::Validation("user_id 不能为空".into()));
        }
        if registration.token.trim().is_empty() {
            return Err(NotificationError::Validation("token 不能为空".into()));
        }

        let token = self.repo.upsert(&registration).await?;
        info!("设备令牌已登记");
        Ok(token)
    }

    /// 列出用户的活跃令牌，顺序无意义
    pub async fn list_active(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        self.repo.list_active_by_user(user_id).await
    }

    /// 列出用户的全部令牌（含已停用），用于排查
    pub async fn list_all(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        self.repo.list_by_user(user_id).await
    }

    /// 停用令牌，重复调用无副作用
    #[instrument(skip(self))]
    pub async fn deactivate(&self, token: &str) -> Result<()> {
        let affected = self.repo.deactivate_token(token).await?;
        debug!(affected, "设备令牌已停用");
        Ok(())
    }
}

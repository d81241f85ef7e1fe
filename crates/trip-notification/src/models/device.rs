//! 设备令牌实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Platform;

/// 设备推送令牌
///
/// 按 (user_id, platform) 唯一，推送服务报告令牌失效时置为非活跃，从不物理删除
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub user_id: String,
    pub token: String,
    pub platform: Platform,
    /// 设备语言，空字符串表示未设置
    pub language: String,
    /// IANA 时区名，如 "Asia/Kolkata"
    pub timezone: String,
    pub active: bool,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// 设备登记请求
#[derive(Debug, Clone)]
pub struct DeviceRegistration {
    pub user_id: String,
    pub token: String,
    pub platform: Platform,
    pub language: String,
    pub timezone: String,
}

impl DeviceRegistration {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>, platform: Platform) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            platform,
            language: String::new(),
            timezone: "UTC".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}

//! 行程通知服务错误类型
//!
//! 区分配置错误、存储错误、推送调用失败与参数校验错误。
//! 单个接收方的投递失败不是错误，见 `models::DeliveryFailure`。

use aura_shared::error::AuraError;
use thiserror::Error;
use uuid::Uuid;

/// 行程通知服务错误类型
#[derive(Debug, Error)]
pub enum NotificationError {
    // === 配置错误 ===
    #[error("推送服务未启用: {0}")]
    Configuration(String),

    // === 存储错误 ===
    #[error("存储错误: {0}")]
    Storage(#[from] AuraError),

    // === 推送错误 ===
    #[error("推送调用失败: provider={provider}, reason={reason}")]
    Dispatch { provider: String, reason: String },

    // === 业务错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("定时通知不存在: {0}")]
    ScheduledNotFound(Uuid),
}

impl From<sqlx::Error> for NotificationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(AuraError::Database(err))
    }
}

impl NotificationError {
    /// 构造推送调用失败错误
    pub fn dispatch(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dispatch {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Dispatch { .. } => "DISPATCH_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ScheduledNotFound(_) => "SCHEDULED_NOT_FOUND",
        }
    }

    /// 是否可以重试
    ///
    /// 存储不可达和推送调用失败可能是瞬时故障，定时通知会在下一次轮询时重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Dispatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, NotificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            NotificationError::Configuration("missing key".into()).code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(
            NotificationError::dispatch("fcm", "timeout").code(),
            "DISPATCH_ERROR"
        );
        assert_eq!(
            NotificationError::ScheduledNotFound(Uuid::nil()).code(),
            "SCHEDULED_NOT_FOUND"
        );
    }

    #[test]
    fn test_sqlx_error_becomes_storage() {
        let err = NotificationError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_not_retryable() {
        let err = NotificationError::Validation("token 不能为空".into());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "参数校验失败: token 不能为空");
    }

    #[test]
    fn test_dispatch_message() {
        let err = NotificationError::dispatch("fcm", "HTTP 401");
        assert_eq!(err.to_string(), "推送调用失败: provider=fcm, reason=HTTP 401");
    }
}

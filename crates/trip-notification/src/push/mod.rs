//! 推送服务抽象
//!
//! 定义多接收方推送的统一接口，分发器只依赖该接口，
//! 具体推送服务（FCM）在子模块中实现。

mod fcm;

pub use fcm::FcmPushSender;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{NotificationRequest, Priority, RecipientOutcome, SendResult};

/// 推送服务 trait
///
/// 一次调用向多个令牌发送同一条消息。单个接收方失败通过
/// `BatchResponse` 中的逐条结果返回，调用本身失败才返回 Err。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushSender: Send + Sync {
    /// 推送服务名称（用于日志和错误）
    fn provider(&self) -> &'static str;

    /// 批量发送，返回结果与 `message.tokens` 一一对应
    async fn send_multicast(&self, message: &PushMessage) -> Result<BatchResponse>;
}

/// 各平台展示参数，完全由优先级决定
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformHints {
    /// Android 消息优先级："high" / "normal"
    pub android_priority: &'static str,
    /// APNs 优先级头：10 立即投递，5 省电投递
    pub apns_priority: &'static str,
    /// Web Push Urgency 头
    pub webpush_urgency: &'static str,
    /// 提示音
    pub sound: &'static str,
}

impl PlatformHints {
    pub fn for_priority(priority: Priority) -> Self {
        let urgent = priority.is_urgent();
        let sound = match priority {
            Priority::Critical => "emergency",
            Priority::High => "alert",
            Priority::Normal | Priority::Low => "default",
        };

        Self {
            android_priority: if urgent { "high" } else { "normal" },
            apns_priority: if urgent { "10" } else { "5" },
            webpush_urgency: if urgent { "high" } else { "normal" },
            sound,
        }
    }
}

/// 多接收方推送消息
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub data: HashMap<String, String>,
    pub hints: PlatformHints,
}

impl PushMessage {
    /// 用（已本地化的）请求构建发给指定令牌的消息
    pub fn from_request(request: &NotificationRequest, tokens: Vec<String>) -> Self {
        Self {
            tokens,
            title: request.title.clone(),
            body: request.body.clone(),
            image_url: request.image_url.clone(),
            data: request.push_data(),
            hints: PlatformHints::for_priority(request.priority),
        }
    }
}

/// 一次批量推送的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub success_count: u32,
    pub failure_count: u32,
    /// 与提交的令牌顺序一致
    pub responses: Vec<RecipientOutcome>,
}

impl BatchResponse {
    /// 由逐条结果汇总计数
    pub fn from_outcomes(responses: Vec<RecipientOutcome>) -> Self {
        let success_count = responses.iter().filter(|r| r.is_success()).count() as u32;
        let failure_count = responses.len() as u32 - success_count;
        Self {
            success_count,
            failure_count,
            responses,
        }
    }
}

impl From<BatchResponse> for SendResult {
    fn from(batch: BatchResponse) -> Self {
        SendResult {
            success_count: batch.success_count,
            failure_count: batch.failure_count,
            outcomes: batch.responses,
        }
    }
}

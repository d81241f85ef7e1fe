//! 通知请求与发送结果定义

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{NotificationKind, Priority};

/// 通知请求
///
/// 构造完成后不再修改；本地化通过 `localized` 生成新值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: String,
    pub trip_id: Option<String>,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub title: String,
    pub body: String,
    /// 业务数据，同时作为模板占位符的取值来源
    #[serde(default)]
    pub data: HashMap<String, String>,
    pub image_url: Option<String>,
    pub action_url: Option<String>,
    /// 计划发送时间，None 表示立即发送
    pub scheduled_at: Option<DateTime<Utc>>,
    /// 目标语言，空字符串表示未指定
    #[serde(default)]
    pub language: String,
}

impl NotificationRequest {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        priority: Priority,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            trip_id: None,
            kind,
            priority,
            title: title.into(),
            body: body.into(),
            data: HashMap::new(),
            image_url: None,
            action_url: None,
            scheduled_at: None,
            language: String::new(),
        }
    }

    pub fn with_trip(mut self, trip_id: impl Into<String>) -> Self {
        self.trip_id = Some(trip_id.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// 生成替换了标题、正文和语言的新请求，原请求不变
    pub fn localized(
        &self,
        title: impl Into<String>,
        body: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            language: language.into(),
            ..self.clone()
        }
    }

    /// 推送数据载荷：业务数据加上 kind、priority、trip_id、action_url 标准字段
    pub fn push_data(&self) -> HashMap<String, String> {
        let mut data = self.data.clone();
        data.insert("kind".to_string(), self.kind.as_str().to_string());
        data.insert("priority".to_string(), self.priority.as_str().to_string());
        if let Some(trip_id) = &self.trip_id {
            data.insert("trip_id".to_string(), trip_id.clone());
        }
        if let Some(action_url) = &self.action_url {
            data.insert("action_url".to_string(), action_url.clone());
        }
        data
    }
}

/// 单个接收方投递失败的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 令牌已注销（应用卸载或令牌过期）
    Unregistered,
    /// 令牌格式非法
    InvalidArgument,
    /// 其他错误（限流、服务端错误等），不影响令牌有效性
    Other,
}

/// 单个接收方的投递失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub kind: FailureKind,
    /// 推送服务返回的原始错误码
    pub code: String,
}

impl DeliveryFailure {
    pub fn new(kind: FailureKind, code: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
        }
    }

    /// 是否应停用该令牌
    pub fn invalidates_token(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::Unregistered | FailureKind::InvalidArgument
        )
    }
}

/// 单个令牌的投递结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub token: String,
    pub failure: Option<DeliveryFailure>,
}

impl RecipientOutcome {
    pub fn delivered(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            failure: None,
        }
    }

    pub fn failed(token: impl Into<String>, failure: DeliveryFailure) -> Self {
        Self {
            token: token.into(),
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// 一次发送的聚合结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success_count: u32,
    pub failure_count: u32,
    pub outcomes: Vec<RecipientOutcome>,
}

impl SendResult {
    /// 无需发送时的空结果
    pub fn empty() -> Self {
        Self::default()
    }

    /// 合并另一批次的结果
    pub fn absorb(&mut self, other: SendResult) {
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
        self.outcomes.extend(other.outcomes);
    }

    /// 需要停用的令牌
    pub fn invalid_tokens(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match &o.failure {
            Some(f) if f.invalidates_token() => Some(o.token.as_str()),
            _ => None,
        })
    }

    /// 是否有接收方（含失败）
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// 行程广播结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSummary {
    /// 行程成员数
    pub members: usize,
    /// 发送调用成功的成员数
    pub delivered: usize,
    /// 发送调用失败的成员数
    pub failed: usize,
}

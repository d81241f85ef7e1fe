//! FCM 推送实现
//!
//! 使用 FCM HTTP 多播接口（`registration_ids`）发送，单次请求最多 1000 个令牌，
//! 超出时分批请求并按原顺序拼接结果。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aura_shared::config::PushConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{BatchResponse, PushMessage, PushSender};
use crate::error::{NotificationError, Result};
use crate::models::{DeliveryFailure, FailureKind, RecipientOutcome};

const PROVIDER: &str = "fcm";

/// 单次多播请求的令牌上限
const MAX_TOKENS_PER_REQUEST: usize = 1000;

/// FCM 多播请求体
#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    registration_ids: &'a [String],
    priority: &'static str,
    notification: FcmNotification<'a>,
    data: &'a HashMap<String, String>,
    /// 高优先级消息唤醒 iOS 后台应用
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    content_available: bool,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
    sound: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

/// FCM 多播响应体
#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 对 FCM 错误码分类
fn classify_error(code: &str) -> FailureKind {
    match code {
        "NotRegistered" => FailureKind::Unregistered,
        "InvalidRegistration" | "MissingRegistration" => FailureKind::InvalidArgument,
        _ => FailureKind::Other,
    }
}

/// 将响应结果与提交的令牌逐一对应
fn map_results(tokens: &[String], response: FcmResponse) -> Result<Vec<RecipientOutcome>> {
    if response.results.len() != tokens.len() {
        return Err(NotificationError::dispatch(
            PROVIDER,
            format!(
                "结果数量与令牌数量不一致: results={}, tokens={}",
                response.results.len(),
                tokens.len()
            ),
        ));
    }

    Ok(tokens
        .iter()
        .zip(response.results)
        .map(|(token, result)| match result.error {
            Some(code) => RecipientOutcome::failed(
                token.clone(),
                DeliveryFailure::new(classify_error(&code), code),
            ),
            None => {
                debug!(message_id = ?result.message_id, "FCM 投递成功");
                RecipientOutcome::delivered(token.clone())
            }
        })
        .collect())
}

/// FCM 推送服务
pub struct FcmPushSender {
    client: Client,
    endpoint: String,
    server_key: String,
}

impl FcmPushSender {
    /// 从配置创建
    ///
    /// 推送未启用或缺少 server_key 时返回 `Configuration` 错误
    pub fn from_config(config: &PushConfig) -> Result<Self> {
        if !config.enabled {
            return Err(NotificationError::Configuration(
                "push.enabled = false".into(),
            ));
        }

        let server_key = config
            .server_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| NotificationError::Configuration("缺少 push.server_key".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                NotificationError::Configuration(format!("HTTP 客户端创建失败: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            server_key: server_key.to_string(),
        })
    }

    async fn send_chunk(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> Result<Vec<RecipientOutcome>> {
        let urgent = message.hints.android_priority == "high";
        let body = FcmRequest {
            registration_ids: tokens,
            priority: message.hints.android_priority,
            notification: FcmNotification {
                title: &message.title,
                body: &message.body,
                sound: message.hints.sound,
                image: message.image_url.as_deref(),
            },
            data: &message.data,
            content_available: urgent,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("key={}", self.server_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::dispatch(PROVIDER, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "FCM 请求失败");
            return Err(NotificationError::dispatch(
                PROVIDER,
                format!("HTTP {}: {}", status, text),
            ));
        }

        let parsed: FcmResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::dispatch(PROVIDER, format!("响应解析失败: {}", e)))?;

        map_results(tokens, parsed)
    }
}

#[async_trait]
impl PushSender for FcmPushSender {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    /// 按 1000 个令牌分批发送
    ///
    /// 任一批次失败时返回 `Dispatch` 错误，已被接受的批次的逐条结果一并丢弃：
    /// 这些批次中报告失效的令牌不会被停用，重试时仍会作为接收方。
    #[instrument(skip(self, message), fields(tokens = message.tokens.len()))]
    async fn send_multicast(&self, message: &PushMessage) -> Result<BatchResponse> {
        let mut outcomes = Vec::with_capacity(message.tokens.len());
        for chunk in message.tokens.chunks(MAX_TOKENS_PER_REQUEST) {
            outcomes.extend(self.send_chunk(message, chunk).await?);
        }
        Ok(BatchResponse::from_outcomes(outcomes))
    }
}

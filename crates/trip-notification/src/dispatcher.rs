//! 通知分发器
//!
//! 负责一次发送的完整流程：查询活跃令牌 → 按语言分组并本地化 →
//! 组装多接收方消息 → 调用推送服务 → 停用失效令牌 → 记录发送历史。
//!
//! 推送服务调用失败会中止整个发送并返回 `Dispatch` 错误；
//! 推送成功之后的令牌停用和历史记录都是尽力而为，失败只记录日志。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use aura_shared::config::PushConfig;
use aura_shared::observability::metrics;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::models::{DeviceToken, NotificationHistory, NotificationRequest, SendResult};
use crate::push::{FcmPushSender, PushMessage, PushSender};
use crate::registry::DeviceRegistry;
use crate::repository::NotificationHistoryRepositoryTrait;
use crate::template::{TemplateEngine, normalize_language};

/// 推送后端
///
/// 缺少推送凭据时分发器以 `Disabled` 状态构造，所有发送变为空操作
#[derive(Clone)]
pub enum PushBackend {
    Enabled(Arc<dyn PushSender>),
    Disabled { reason: String },
}

/// 通知分发器
#[derive(Clone)]
pub struct Dispatcher {
    backend: PushBackend,
    registry: DeviceRegistry,
    templates: Arc<TemplateEngine>,
    history: Arc<dyn NotificationHistoryRepositoryTrait>,
}

impl Dispatcher {
    pub fn new(
        sender: Arc<dyn PushSender>,
        registry: DeviceRegistry,
        templates: Arc<TemplateEngine>,
        history: Arc<dyn NotificationHistoryRepositoryTrait>,
    ) -> Self {
        Self {
            backend: PushBackend::Enabled(sender),
            registry,
            templates,
            history,
        }
    }

    /// 创建禁用状态的分发器
    pub fn disabled(
        reason: impl Into<String>,
        registry: DeviceRegistry,
        templates: Arc<TemplateEngine>,
        history: Arc<dyn NotificationHistoryRepositoryTrait>,
    ) -> Self {
        Self {
            backend: PushBackend::Disabled {
                reason: reason.into(),
            },
            registry,
            templates,
            history,
        }
    }

    /// 根据推送配置创建
    ///
    /// 推送配置不可用时返回禁用状态的分发器而不是错误
    pub fn from_config(
        config: &PushConfig,
        registry: DeviceRegistry,
        templates: Arc<TemplateEngine>,
        history: Arc<dyn NotificationHistoryRepositoryTrait>,
    ) -> Self {
        match FcmPushSender::from_config(config) {
            Ok(sender) => {
                info!(endpoint = %config.endpoint, "推送服务已启用");
                Self::new(Arc::new(sender), registry, templates, history)
            }
            Err(e) => {
                warn!(reason = %e, "推送服务未启用，所有通知发送将被跳过");
                Self::disabled(e.to_string(), registry, templates, history)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.backend, PushBackend::Enabled(_))
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// 发送通知给用户的全部活跃设备
    ///
    /// 没有活跃令牌时返回空结果且不调用推送服务
    #[instrument(skip(self, request), fields(user_id = %request.user_id, kind = request.kind.as_str()))]
    pub async fn send(&self, request: &NotificationRequest) -> Result<SendResult> {
        let sender = match &self.backend {
            PushBackend::Enabled(sender) => sender,
            PushBackend::Disabled { reason } => {
                debug!(reason = %reason, "推送服务未启用，跳过发送");
                return Ok(SendResult::empty());
            }
        };

        let start = Instant::now();
        let kind = request.kind.as_str();

        let tokens = self.registry.list_active(&request.user_id).await?;
        if tokens.is_empty() {
            debug!("用户没有活跃设备，跳过发送");
            metrics::record_notification_dispatch(
                kind,
                "no_recipients",
                start.elapsed().as_secs_f64(),
            );
            return Ok(SendResult::empty());
        }

        let mut result = SendResult::empty();
        for (language, group) in self.group_by_language(request, tokens) {
            let localized = self.templates.localize(request, &language);
            let message = PushMessage::from_request(&localized, group);

            match sender.send_multicast(&message).await {
                Ok(batch) => result.absorb(batch.into()),
                Err(e) => {
                    warn!(
                        provider = sender.provider(),
                        language = %language,
                        error = %e,
                        "推送服务调用失败"
                    );
                    metrics::record_notification_dispatch(
                        kind,
                        "dispatch_error",
                        start.elapsed().as_secs_f64(),
                    );
                    return Err(e);
                }
            }
        }

        self.deactivate_invalid_tokens(&result).await;
        self.record_history(request, &result).await;

        metrics::record_push_recipients(result.success_count as u64, result.failure_count as u64);
        metrics::record_notification_dispatch(kind, "success", start.elapsed().as_secs_f64());

        info!(
            success_count = result.success_count,
            failure_count = result.failure_count,
            "通知发送完成"
        );

        Ok(result)
    }

    /// 查询用户的发送历史
    pub async fn list_history(&self, user_id: &str, limit: i64) -> Result<Vec<NotificationHistory>> {
        self.history.list_by_user(user_id, limit).await
    }

    /// 按设备语言分组，设备未设置语言时使用请求语言
    fn group_by_language(
        &self,
        request: &NotificationRequest,
        tokens: Vec<DeviceToken>,
    ) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for token in tokens {
            let language = if token.language.trim().is_empty() {
                normalize_language(&request.language)
            } else {
                normalize_language(&token.language)
            };
            groups.entry(language).or_default().push(token.token);
        }
        groups
    }

    async fn deactivate_invalid_tokens(&self, result: &SendResult) {
        let mut deactivated = 0u64;
        for token in result.invalid_tokens() {
            match self.registry.deactivate(token).await {
                Ok(()) => deactivated += 1,
                Err(e) => warn!(error = %e, "停用失效令牌失败"),
            }
        }

        if deactivated > 0 {
            info!(count = deactivated, "已停用失效设备令牌");
            metrics::record_tokens_deactivated(deactivated);
        }
    }

    /// 按源语言请求记录一条历史，多个语言分组合并为一条
    async fn record_history(&self, request: &NotificationRequest, result: &SendResult) {
        let history = NotificationHistory::from_result(request, result);
        if let Err(e) = self.history.record(&history).await {
            warn!(error = %e, "记录发送历史失败");
        }
    }
}

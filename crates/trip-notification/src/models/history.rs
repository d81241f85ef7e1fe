//! 发送历史实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NotificationKind;
use super::notification::{NotificationRequest, SendResult};

/// 通知发送历史
///
/// 每次成功调用推送服务后记录一条，只保存聚合计数。
/// 标题和正文是请求的源语言文本，不是各语言分组实际收到的本地化文本。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHistory {
    pub id: Uuid,
    pub user_id: String,
    #[sqlx(default)]
    pub trip_id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub success_count: i32,
    pub failure_count: i32,
}

impl NotificationHistory {
    /// 根据原始请求和聚合结果生成历史记录，标题和正文取自未本地化的请求
    pub fn from_result(request: &NotificationRequest, result: &SendResult) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: request.user_id.clone(),
            trip_id: request.trip_id.clone(),
            kind: request.kind,
            title: request.title.clone(),
            body: request.body.clone(),
            sent_at: Utc::now(),
            success_count: result.success_count as i32,
            failure_count: result.failure_count as i32,
        }
    }
}

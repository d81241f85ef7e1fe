//! 定时通知实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::notification::NotificationRequest;

/// 到期扫描的分页位置
///
/// 按 (scheduled_at, id) 排序，下一页只返回严格位于该位置之后的条目
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DueCursor {
    pub scheduled_at: DateTime<Utc>,
    pub id: Uuid,
}

/// 待发送的定时通知
///
/// 以生成的 id 作为主键，同一用户同一秒内的多条定时通知互不覆盖
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub user_id: String,
    pub scheduled_at: DateTime<Utc>,
    /// 完整的原始请求
    #[sqlx(json)]
    pub payload: NotificationRequest,
    pub created_at: DateTime<Utc>,
}

impl ScheduledNotification {
    /// 为带发送时间的请求创建定时记录，请求未设置发送时间时返回 None
    pub fn from_request(request: NotificationRequest) -> Option<Self> {
        let scheduled_at = request.scheduled_at?;
        Some(Self {
            id: Uuid::now_v7(),
            user_id: request.user_id.clone(),
            scheduled_at,
            payload: request,
            created_at: Utc::now(),
        })
    }

    /// 是否已到发送时间
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    /// 本条目在到期扫描中的位置
    pub fn cursor(&self) -> DueCursor {
        DueCursor {
            scheduled_at: self.scheduled_at,
            id: self.id,
        }
    }
}

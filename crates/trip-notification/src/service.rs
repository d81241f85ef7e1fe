//! 行程通知服务
//!
//! 面向业务方的发送入口：天气预警、航班延误、行程提醒、预订确认和行程变更广播。
//! 每个入口构造固定类型和优先级的请求后交给分发器或调度器。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::builder::{FlightDelay, NotificationBuilder, WeatherAlert};
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::models::{BroadcastSummary, NotificationHistory, NotificationRequest, SendResult};
use crate::repository::TripMemberRepositoryTrait;
use crate::scheduler::{ScheduleOutcome, Scheduler};

/// 行程通知服务
#[derive(Clone)]
pub struct TripNotificationService {
    dispatcher: Dispatcher,
    scheduler: Scheduler,
    members: Arc<dyn TripMemberRepositoryTrait>,
}

impl TripNotificationService {
    pub fn new(
        dispatcher: Dispatcher,
        scheduler: Scheduler,
        members: Arc<dyn TripMemberRepositoryTrait>,
    ) -> Self {
        Self {
            dispatcher,
            scheduler,
            members,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// 发送任意通知请求
    pub async fn send(&self, request: &NotificationRequest) -> Result<SendResult> {
        self.dispatcher.send(request).await
    }

    /// 天气预警
    pub async fn send_weather_alert(
        &self,
        user_id: &str,
        trip_id: &str,
        alert: &WeatherAlert,
    ) -> Result<SendResult> {
        let request = NotificationBuilder::weather_alert(user_id, trip_id, alert);
        self.dispatcher.send(&request).await
    }

    /// 航班延误或取消
    pub async fn send_delay_alert(
        &self,
        user_id: &str,
        trip_id: &str,
        delay: &FlightDelay,
    ) -> Result<SendResult> {
        let request = NotificationBuilder::delay_alert(user_id, trip_id, delay);
        self.dispatcher.send(&request).await
    }

    /// 立即发送行程提醒，文案中的相对时间按 starts_at 与当前时间计算
    pub async fn send_trip_reminder(
        &self,
        user_id: &str,
        trip_id: &str,
        destination: &str,
        reminder_type: &str,
        starts_at: DateTime<Utc>,
    ) -> Result<SendResult> {
        let request = NotificationBuilder::trip_reminder(
            user_id,
            trip_id,
            destination,
            reminder_type,
            starts_at - Utc::now(),
        );
        self.dispatcher.send(&request).await
    }

    /// 在 starts_at 之前 lead_time 发送行程提醒
    pub async fn schedule_trip_reminder(
        &self,
        user_id: &str,
        trip_id: &str,
        destination: &str,
        reminder_type: &str,
        starts_at: DateTime<Utc>,
        lead_time: Duration,
    ) -> Result<ScheduleOutcome> {
        let request = NotificationBuilder::trip_reminder(
            user_id,
            trip_id,
            destination,
            reminder_type,
            lead_time,
        )
        .scheduled_for(starts_at - lead_time);

        self.scheduler.schedule(request).await
    }

    /// 预订确认
    pub async fn send_booking_confirmation(
        &self,
        user_id: &str,
        trip_id: &str,
        booking_type: &str,
        confirmation_number: &str,
    ) -> Result<SendResult> {
        let request = NotificationBuilder::booking_confirmation(
            user_id,
            trip_id,
            booking_type,
            confirmation_number,
        );
        self.dispatcher.send(&request).await
    }

    /// 向行程全部成员广播行程变更
    ///
    /// 成员查询失败只记录日志并返回空统计；单个成员发送失败不影响其他成员
    #[instrument(skip(self, message))]
    pub async fn send_trip_update_notification(
        &self,
        trip_id: &str,
        message: &str,
    ) -> BroadcastSummary {
        let members = match self.members.list_member_ids(trip_id).await {
            Ok(members) => members,
            Err(e) => {
                error!(error = %e, "查询行程成员失败，跳过广播");
                return BroadcastSummary::default();
            }
        };

        let requests: Vec<NotificationRequest> = members
            .iter()
            .map(|user_id| NotificationBuilder::trip_update(user_id.as_str(), trip_id, message))
            .collect();

        let results = join_all(requests.iter().map(|r| self.dispatcher.send(r))).await;

        let mut summary = BroadcastSummary {
            members: members.len(),
            ..Default::default()
        };
        for (user_id, result) in members.iter().zip(results) {
            match result {
                Ok(_) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(user_id = %user_id, error = %e, "行程成员通知发送失败");
                }
            }
        }

        info!(
            members = summary.members,
            delivered = summary.delivered,
            failed = summary.failed,
            "行程变更广播完成"
        );

        summary
    }

    /// 查询用户的发送历史
    pub async fn list_history(&self, user_id: &str, limit: i64) -> Result<Vec<NotificationHistory>> {
        self.dispatcher.list_history(user_id, limit).await
    }
}

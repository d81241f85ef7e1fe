//! 定时通知调度
//!
//! 带发送时间的通知先持久化，由轮询方周期调用 `process_due` 发送到期条目。
//! 发送成功后才删除条目；发送失败的条目原样保留，在下一次轮询时重试。
//! 一次扫描会分页读完全部到期条目，失败条目再多也不会挡住排在后面的条目。
//!
//! 本模块没有内部定时器，多个实例同时调用 `process_due` 可能重复发送，
//! 轮询方需自行保证单实例（见 `worker`）。

use std::sync::Arc;

use async_trait::async_trait;
use aura_shared::observability::metrics;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::error::{NotificationError, Result};
use crate::models::{DueCursor, NotificationRequest, ScheduledNotification, SendResult};
use crate::repository::ScheduledNotificationRepositoryTrait;

/// `schedule` 的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    /// 未设置发送时间，已立即发送
    Sent(SendResult),
    /// 已持久化，等待到期
    Scheduled { id: Uuid, scheduled_at: DateTime<Utc> },
    /// 推送服务未启用，未做任何处理
    Skipped,
}

/// 一次到期扫描的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    /// 本次扫描读取到的到期条目数
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
    /// 守卫要求提前停止
    pub interrupted: bool,
}

/// 到期扫描守卫
///
/// 每条定时通知发送前调用，返回 false 时停止本次扫描
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScanGuard: Send + Sync {
    async fn should_continue(&self) -> bool;
}

struct Unguarded;

#[async_trait]
impl ScanGuard for Unguarded {
    async fn should_continue(&self) -> bool {
        true
    }
}

/// 定时通知调度器
#[derive(Clone)]
pub struct Scheduler {
    dispatcher: Dispatcher,
    repo: Arc<dyn ScheduledNotificationRepositoryTrait>,
    /// 单次扫描最多处理的条目数
    batch_size: i64,
}

impl Scheduler {
    pub fn new(
        dispatcher: Dispatcher,
        repo: Arc<dyn ScheduledNotificationRepositoryTrait>,
        batch_size: i64,
    ) -> Self {
        Self {
            dispatcher,
            repo,
            batch_size: batch_size.max(1),
        }
    }

    /// 调度通知
    ///
    /// 没有发送时间的请求立即交给分发器发送，否则持久化等待到期
    #[instrument(skip(self, request), fields(user_id = %request.user_id, kind = request.kind.as_str()))]
    pub async fn schedule(&self, request: NotificationRequest) -> Result<ScheduleOutcome> {
        if !self.dispatcher.is_enabled() {
            debug!("推送服务未启用，跳过调度");
            return Ok(ScheduleOutcome::Skipped);
        }

        let Some(scheduled) = ScheduledNotification::from_request(request.clone()) else {
            let result = self.dispatcher.send(&request).await?;
            return Ok(ScheduleOutcome::Sent(result));
        };

        self.repo.insert(&scheduled).await?;
        info!(
            scheduled_id = %scheduled.id,
            scheduled_at = %scheduled.scheduled_at,
            "定时通知已保存"
        );

        Ok(ScheduleOutcome::Scheduled {
            id: scheduled.id,
            scheduled_at: scheduled.scheduled_at,
        })
    }

    /// 发送所有计划时间不晚于 now 的定时通知
    ///
    /// 单条发送失败只记录日志，条目保留到下一次扫描
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<ProcessSummary> {
        self.process_due_guarded(now, &Unguarded).await
    }

    /// 带守卫的到期扫描
    ///
    /// 按 batch_size 分页读取，每页从上一页最后一条之后继续，发送失败的条目不会挡住后面的条目。
    /// 每条发送前询问 `guard`，返回 false 时停止扫描，剩余条目留到下一次扫描。
    #[instrument(skip(self, guard))]
    pub async fn process_due_guarded(
        &self,
        now: DateTime<Utc>,
        guard: &dyn ScanGuard,
    ) -> Result<ProcessSummary> {
        if !self.dispatcher.is_enabled() {
            debug!("推送服务未启用，跳过到期扫描");
            return Ok(ProcessSummary::default());
        }

        let mut summary = ProcessSummary::default();
        let mut cursor: Option<DueCursor> = None;

        'scan: loop {
            let page = self.repo.list_due(now, cursor, self.batch_size).await?;
            if page.is_empty() {
                break;
            }
            summary.due += page.len();
            debug!(count = page.len(), "读取到期定时通知");

            for entry in &page {
                if !guard.should_continue().await {
                    summary.interrupted = true;
                    warn!(
                        processed = summary.sent + summary.failed,
                        "到期扫描被中止，剩余条目留到下次扫描"
                    );
                    break 'scan;
                }
                self.deliver(entry, &mut summary).await;
            }

            if (page.len() as i64) < self.batch_size {
                break;
            }
            cursor = page.last().map(ScheduledNotification::cursor);
        }

        if summary.due > 0 {
            info!(
                due = summary.due,
                sent = summary.sent,
                failed = summary.failed,
                interrupted = summary.interrupted,
                "到期扫描完成"
            );
        }

        Ok(summary)
    }

    async fn deliver(&self, entry: &ScheduledNotification, summary: &mut ProcessSummary) {
        match self.dispatcher.send(&entry.payload).await {
            Ok(result) => {
                summary.sent += 1;
                metrics::record_scheduled_processed("sent");
                debug!(
                    scheduled_id = %entry.id,
                    success_count = result.success_count,
                    "定时通知已发送"
                );

                // 删除失败会导致下次扫描重复发送
                if let Err(e) = self.repo.delete(entry.id).await {
                    error!(
                        scheduled_id = %entry.id,
                        error = %e,
                        "删除已发送的定时通知失败"
                    );
                }
            }
            Err(e) => {
                summary.failed += 1;
                metrics::record_scheduled_processed("failed");
                warn!(
                    scheduled_id = %entry.id,
                    user_id = %entry.user_id,
                    error = %e,
                    "定时通知发送失败，保留到下次扫描"
                );
            }
        }
    }

    /// 取消尚未发送的定时通知
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(NotificationError::ScheduledNotFound(id));
        }
        info!("定时通知已取消");
        Ok(())
    }

    /// 列出用户尚未发送的定时通知
    pub async fn list_pending(&self, user_id: &str) -> Result<Vec<ScheduledNotification>> {
        self.repo.list_by_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceRegistration, NotificationKind, Platform, Priority, RecipientOutcome};
    use crate::push::{BatchResponse, MockPushSender};
    use crate::registry::DeviceRegistry;
    use crate::repository::MockScheduledNotificationRepositoryTrait;
    use crate::repository::memory::{
        MemoryDeviceTokenRepository, MemoryNotificationHistoryRepository,
        MemoryScheduledNotificationRepository,
    };
    use crate::template::TemplateEngine;
    use aura_shared::config::PushConfig;
    use chrono::Duration;

    async fn registry() -> DeviceRegistry {
        let registry = DeviceRegistry::new(Arc::new(MemoryDeviceTokenRepository::new()));
        registry
            .register(DeviceRegistration::new("user-1", "tok", Platform::Ios))
            .await
            .unwrap();
        registry
    }

    fn dispatcher_with(sender: MockPushSender, registry: DeviceRegistry) -> Dispatcher {
        Dispatcher::new(
            Arc::new(sender),
            registry,
            Arc::new(TemplateEngine::default()),
            Arc::new(MemoryNotificationHistoryRepository::new()),
        )
    }

    fn delivering_sender() -> MockPushSender {
        let mut sender = MockPushSender::new();
        sender.expect_provider().return_const("fake");
        sender.expect_send_multicast().returning(|message| {
            Ok(BatchResponse::from_outcomes(
                message
                    .tokens
                    .iter()
                    .map(|t| RecipientOutcome::delivered(t.clone()))
                    .collect(),
            ))
        });
        sender
    }

    fn reminder() -> NotificationRequest {
        NotificationRequest::new(
            "user-1",
            NotificationKind::TripReminder,
            Priority::Normal,
            "Trip Reminder",
            "Your trip starts soon",
        )
    }

    #[tokio::test]
    async fn test_schedule_without_time_sends_immediately() {
        let repo = Arc::new(MemoryScheduledNotificationRepository::new());
        let dispatcher = dispatcher_with(delivering_sender(), registry().await);
        let scheduler = Scheduler::new(dispatcher, repo.clone(), 10);

        let outcome = scheduler.schedule(reminder()).await.unwrap();
        match outcome {
            ScheduleOutcome::Sent(result) => assert_eq!(result.success_count, 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_process_due_respects_schedule_time() {
        let mut sender = MockPushSender::new();
        sender.expect_provider().return_const("fake");
        sender.expect_send_multicast().times(1).returning(|message| {
            Ok(BatchResponse::from_outcomes(
                message
                    .tokens
                    .iter()
                    .map(|t| RecipientOutcome::delivered(t.clone()))
                    .collect(),
            ))
        });

        let repo = Arc::new(MemoryScheduledNotificationRepository::new());
        let scheduler = Scheduler::new(dispatcher_with(sender, registry().await), repo.clone(), 10);

        let at = Utc::now() + Duration::hours(1);
        let outcome = scheduler.schedule(reminder().scheduled_for(at)).await.unwrap();
        assert!(matches!(
            outcome,
            ScheduleOutcome::Scheduled { scheduled_at, .. } if scheduled_at == at
        ));

        // 未到期
        let summary = scheduler.process_due(at - Duration::seconds(1)).await.unwrap();
        assert_eq!(summary.due, 0);
        assert_eq!(repo.len(), 1);

        // 恰好到期
        let summary = scheduler.process_due(at).await.unwrap();
        assert_eq!(
            summary,
            ProcessSummary {
                due: 1,
                sent: 1,
                failed: 0,
                interrupted: false
            }
        );
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_leaves_entry_in_place() {
        let mut sender = MockPushSender::new();
        sender.expect_provider().return_const("fake");
        sender
            .expect_send_multicast()
            .times(2)
            .returning(|_| Err(NotificationError::dispatch("fake", "HTTP 503")));

        let repo = Arc::new(MemoryScheduledNotificationRepository::new());
        let scheduler = Scheduler::new(dispatcher_with(sender, registry().await), repo.clone(), 10);

        let now = Utc::now();
        scheduler
            .schedule(reminder().scheduled_for(now - Duration::minutes(1)))
            .await
            .unwrap();

        for _ in 0..2 {
            let summary = scheduler.process_due(now).await.unwrap();
            assert_eq!(summary.failed, 1);
            assert_eq!(repo.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_same_second_schedules_both_delivered() {
        let repo = Arc::new(MemoryScheduledNotificationRepository::new());
        let dispatcher = dispatcher_with(delivering_sender(), registry().await);
        let scheduler = Scheduler::new(dispatcher, repo.clone(), 10);

        let at = Utc::now();
        scheduler.schedule(reminder().scheduled_for(at)).await.unwrap();
        scheduler.schedule(reminder().scheduled_for(at)).await.unwrap();
        assert_eq!(repo.len(), 2);

        let summary = scheduler.process_due(at).await.unwrap();
        assert_eq!(summary.sent, 2);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_persists_nothing() {
        let repo = Arc::new(MemoryScheduledNotificationRepository::new());
        let dispatcher = Dispatcher::from_config(
            &PushConfig::default(),
            registry().await,
            Arc::new(TemplateEngine::default()),
            Arc::new(MemoryNotificationHistoryRepository::new()),
        );
        let scheduler = Scheduler::new(dispatcher, repo.clone(), 10);

        let outcome = scheduler
            .schedule(reminder().scheduled_for(Utc::now()))
            .await
            .unwrap();
        assert_eq!(outcome, ScheduleOutcome::Skipped);
        assert!(repo.is_empty());
        assert_eq!(
            scheduler.process_due(Utc::now()).await.unwrap(),
            ProcessSummary::default()
        );
    }

    #[tokio::test]
    async fn test_cancel_and_list_pending() {
        let repo = Arc::new(MemoryScheduledNotificationRepository::new());
        let dispatcher = dispatcher_with(delivering_sender(), registry().await);
        let scheduler = Scheduler::new(dispatcher, repo, 10);

        let outcome = scheduler
            .schedule(reminder().scheduled_for(Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        let ScheduleOutcome::Scheduled { id, .. } = outcome else {
            panic!("expected scheduled outcome");
        };

        assert_eq!(scheduler.list_pending("user-1").await.unwrap().len(), 1);
        scheduler.cancel(id).await.unwrap();
        assert!(scheduler.list_pending("user-1").await.unwrap().is_empty());

        let err = scheduler.cancel(id).await.unwrap_err();
        assert_eq!(err.code(), "SCHEDULED_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_storage_error_surfaces_from_process_due() {
        let mut repo = MockScheduledNotificationRepositoryTrait::new();
        repo.expect_list_due()
            .returning(|_, _, _| Err(NotificationError::from(sqlx::Error::PoolTimedOut)));

        let scheduler = Scheduler::new(
            dispatcher_with(delivering_sender(), registry().await),
            Arc::new(repo),
            10,
        );

        let err = scheduler.process_due(Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");
    }

    #[tokio::test]
    async fn test_failing_entries_do_not_block_later_entries() {
        let registry = registry().await;
        registry
            .register(DeviceRegistration::new("user-bad", "tok-bad", Platform::Android))
            .await
            .unwrap();

        let mut sender = MockPushSender::new();
        sender.expect_provider().return_const("fake");
        sender.expect_send_multicast().returning(|message| {
            if message.tokens.iter().any(|t| t == "tok-bad") {
                return Err(NotificationError::dispatch("fake", "HTTP 503"));
            }
            Ok(BatchResponse::from_outcomes(
                message
                    .tokens
                    .iter()
                    .map(|t| RecipientOutcome::delivered(t.clone()))
                    .collect(),
            ))
        });

        let repo = Arc::new(MemoryScheduledNotificationRepository::new());
        // 批大小小于排在前面的失败条目数
        let scheduler = Scheduler::new(dispatcher_with(sender, registry), repo.clone(), 2);

        let now = Utc::now();
        for minutes in [3, 2] {
            let mut bad = reminder().scheduled_for(now - Duration::minutes(minutes));
            bad.user_id = "user-bad".into();
            scheduler.schedule(bad).await.unwrap();
        }
        scheduler
            .schedule(reminder().scheduled_for(now - Duration::minutes(1)))
            .await
            .unwrap();

        let summary = scheduler.process_due(now).await.unwrap();
        assert_eq!(
            summary,
            ProcessSummary {
                due: 3,
                sent: 1,
                failed: 2,
                interrupted: false
            }
        );
        assert_eq!(repo.len(), 2);
        assert!(scheduler.list_pending("user-1").await.unwrap().is_empty());

        // 失败条目在下一次扫描中重试
        let summary = scheduler.process_due(now).await.unwrap();
        assert_eq!(summary.failed, 2);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_guard_stops_scan_and_keeps_remaining_entries() {
        let repo = Arc::new(MemoryScheduledNotificationRepository::new());
        let scheduler = Scheduler::new(
            dispatcher_with(delivering_sender(), registry().await),
            repo.clone(),
            10,
        );

        let now = Utc::now();
        for minutes in [3, 2, 1] {
            scheduler
                .schedule(reminder().scheduled_for(now - Duration::minutes(minutes)))
                .await
                .unwrap();
        }

        let mut calls = 0;
        let mut guard = MockScanGuard::new();
        guard.expect_should_continue().returning(move || {
            calls += 1;
            calls == 1
        });

        let summary = scheduler.process_due_guarded(now, &guard).await.unwrap();
        assert_eq!(summary.sent, 1);
        assert!(summary.interrupted);
        assert_eq!(repo.len(), 2);
    }
}

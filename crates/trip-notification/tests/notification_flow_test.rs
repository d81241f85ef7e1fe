//! 行程通知完整流程集成测试
//!
//! 使用内存仓储和记录型推送替身驱动 DeviceRegistry → Dispatcher → Scheduler
//! → TripNotificationService 的完整链路，无需外部依赖。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use trip_notification::builder::WeatherAlert;
use trip_notification::error::{NotificationError, Result};
use trip_notification::models::{
    DeliveryFailure, DeviceRegistration, FailureKind, NotificationKind, Platform, Priority,
    RecipientOutcome,
};
use trip_notification::push::{BatchResponse, PushMessage, PushSender};
use trip_notification::repository::memory::{
    MemoryDeviceTokenRepository, MemoryNotificationHistoryRepository,
    MemoryScheduledNotificationRepository, MemoryTripMemberRepository,
};
use trip_notification::scheduler::ScheduleOutcome;
use trip_notification::{
    DeviceRegistry, Dispatcher, Scheduler, TemplateEngine, TripNotificationService,
};

// ==================== 推送替身 ====================

/// 记录每次调用的推送替身
///
/// - `unregistered` 中的令牌返回 NotRegistered
/// - 消息中包含 `unreachable` 中的令牌时整个调用失败
#[derive(Default)]
struct RecordingPushSender {
    sent: Mutex<Vec<PushMessage>>,
    unregistered: HashSet<String>,
    unreachable: HashSet<String>,
}

impl RecordingPushSender {
    fn with_unregistered(mut self, token: &str) -> Self {
        self.unregistered.insert(token.to_string());
        self
    }

    fn with_unreachable(mut self, token: &str) -> Self {
        self.unreachable.insert(token.to_string());
        self
    }

    fn calls(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingPushSender {
    fn provider(&self) -> &'static str {
        "recording"
    }

    async fn send_multicast(&self, message: &PushMessage) -> Result<BatchResponse> {
        self.sent.lock().unwrap().push(message.clone());

        if message.tokens.iter().any(|t| self.unreachable.contains(t)) {
            return Err(NotificationError::dispatch("recording", "connection reset"));
        }

        Ok(BatchResponse::from_outcomes(
            message
                .tokens
                .iter()
                .map(|t| {
                    if self.unregistered.contains(t) {
                        RecipientOutcome::failed(
                            t.clone(),
                            DeliveryFailure::new(FailureKind::Unregistered, "NotRegistered"),
                        )
                    } else {
                        RecipientOutcome::delivered(t.clone())
                    }
                })
                .collect(),
        ))
    }
}

// ==================== 辅助函数 ====================

struct Harness {
    sender: Arc<RecordingPushSender>,
    registry: DeviceRegistry,
    scheduled: Arc<MemoryScheduledNotificationRepository>,
    members: Arc<MemoryTripMemberRepository>,
    service: TripNotificationService,
}

fn harness(sender: RecordingPushSender) -> Harness {
    let sender = Arc::new(sender);
    let registry = DeviceRegistry::new(Arc::new(MemoryDeviceTokenRepository::new()));
    let scheduled = Arc::new(MemoryScheduledNotificationRepository::new());
    let members = Arc::new(MemoryTripMemberRepository::new());

    let dispatcher = Dispatcher::new(
        sender.clone(),
        registry.clone(),
        Arc::new(TemplateEngine::with_defaults("en")),
        Arc::new(MemoryNotificationHistoryRepository::new()),
    );
    let scheduler = Scheduler::new(dispatcher.clone(), scheduled.clone(), 100);
    let service = TripNotificationService::new(dispatcher, scheduler, members.clone());

    Harness {
        sender,
        registry,
        scheduled,
        members,
        service,
    }
}

async fn register(registry: &DeviceRegistry, user_id: &str, token: &str, platform: Platform) {
    registry
        .register(DeviceRegistration::new(user_id, token, platform))
        .await
        .expect("登记设备失败");
}

// ==================== 测试用例 ====================

#[tokio::test]
async fn test_user_without_devices_gets_noop_result() {
    let h = harness(RecordingPushSender::default());

    let result = h
        .service
        .send_booking_confirmation("nobody", "T1", "hotel", "XYZ123")
        .await
        .unwrap();

    assert_eq!(result.success_count, 0);
    assert_eq!(result.failure_count, 0);
    assert!(h.sender.calls().is_empty());
    assert!(h.service.list_history("nobody", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unregistered_token_excluded_from_later_sends() {
    let h = harness(RecordingPushSender::default().with_unregistered("stale-android"));
    register(&h.registry, "asha", "ios-1", Platform::Ios).await;
    register(&h.registry, "asha", "stale-android", Platform::Android).await;

    let result = h
        .service
        .send_booking_confirmation("asha", "T1", "flight", "PNR42")
        .await
        .unwrap();
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 1);

    let active = h.registry.list_active("asha").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].token, "ios-1");

    // 第二次发送不再包含失效令牌
    h.service
        .send_booking_confirmation("asha", "T1", "flight", "PNR43")
        .await
        .unwrap();
    let calls = h.sender.calls();
    assert_eq!(calls.last().unwrap().tokens, vec!["ios-1"]);

    let history = h.service.list_history("asha", 10).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_booking_confirmation_end_to_end() {
    let h = harness(RecordingPushSender::default());
    register(&h.registry, "asha", "ios-1", Platform::Ios).await;

    h.service
        .send_booking_confirmation("asha", "T1", "hotel", "XYZ123")
        .await
        .unwrap();

    let calls = h.sender.calls();
    assert_eq!(calls.len(), 1);
    let message = &calls[0];
    assert_eq!(message.title, "Hotel Booking Confirmed");
    assert!(message.body.contains("XYZ123"));
    assert_eq!(message.data["priority"], Priority::High.as_str());
    assert_eq!(message.data["kind"], NotificationKind::BookingConfirmation.as_str());
    assert_eq!(message.data["trip_id"], "T1");
    assert_eq!(message.hints.android_priority, "high");
    assert_eq!(message.hints.sound, "alert");
}

#[tokio::test]
async fn test_hindi_device_receives_localized_weather_alert() {
    let h = harness(RecordingPushSender::default());
    h.registry
        .register(DeviceRegistration::new("ravi", "android-hi", Platform::Android).with_language("hi"))
        .await
        .unwrap();

    let alert = WeatherAlert {
        alert_type: "चक्रवात".into(),
        severity: "emergency".into(),
        description: "तेज़ हवाएँ और भारी बारिश".into(),
        location: "चेन्नई".into(),
    };
    h.service.send_weather_alert("ravi", "T9", &alert).await.unwrap();

    let calls = h.sender.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].title, "मौसम चेतावनी: चक्रवात");
    assert_eq!(calls[0].body, "चेन्नई में तेज़ हवाएँ और भारी बारिश");
    assert_eq!(calls[0].hints.sound, "emergency");

    // 历史记录保存的是原始请求
    let history = h.service.list_history("ravi", 1).await.unwrap();
    assert_eq!(history[0].title, "Weather Alert: चक्रवात");
}

#[tokio::test]
async fn test_english_device_receives_original_text() {
    let h = harness(RecordingPushSender::default());
    h.registry
        .register(DeviceRegistration::new("sam", "ios-en", Platform::Ios).with_language("en"))
        .await
        .unwrap();

    let alert = WeatherAlert {
        alert_type: "Storm".into(),
        severity: "warning".into(),
        description: "Heavy rain".into(),
        location: "Goa".into(),
    };
    h.service.send_weather_alert("sam", "T2", &alert).await.unwrap();

    let calls = h.sender.calls();
    assert_eq!(calls[0].title, "Weather Alert: Storm");
    assert_eq!(calls[0].body, "Heavy rain in Goa");
}

#[tokio::test]
async fn test_scheduled_reminder_sent_only_when_due() {
    let h = harness(RecordingPushSender::default());
    register(&h.registry, "asha", "ios-1", Platform::Ios).await;

    let starts_at = Utc::now() + Duration::hours(5);
    let outcome = h
        .service
        .schedule_trip_reminder("asha", "T1", "Goa", "departure", starts_at, Duration::hours(2))
        .await
        .unwrap();
    let ScheduleOutcome::Scheduled { scheduled_at, .. } = outcome else {
        panic!("expected scheduled outcome, got {:?}", outcome);
    };

    let scheduler = h.service.scheduler();
    scheduler
        .process_due(scheduled_at - Duration::seconds(1))
        .await
        .unwrap();
    assert!(h.sender.calls().is_empty());
    assert_eq!(h.scheduled.len(), 1);

    let summary = scheduler.process_due(scheduled_at).await.unwrap();
    assert_eq!(summary.sent, 1);
    assert!(h.scheduled.is_empty());

    let calls = h.sender.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].title, "Trip Departure Reminder");
    assert!(calls[0].body.contains("starts in 2 hours"));
}

#[tokio::test]
async fn test_scheduled_entry_kept_after_provider_failure() {
    let h = harness(RecordingPushSender::default().with_unreachable("ios-down"));
    register(&h.registry, "asha", "ios-down", Platform::Ios).await;

    let now = Utc::now();
    h.service
        .scheduler()
        .schedule(
            trip_notification::builder::NotificationBuilder::trip_update("asha", "T1", "Hotel changed")
                .scheduled_for(now),
        )
        .await
        .unwrap();

    let summary = h.service.scheduler().process_due(now).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.scheduled.len(), 1);

    let pending = h.service.scheduler().list_pending("asha").await.unwrap();
    assert_eq!(pending[0].payload.body, "Hotel changed");
}

#[tokio::test]
async fn test_trip_update_broadcast_survives_member_failure() {
    let h = harness(RecordingPushSender::default().with_unreachable("bad-device"));
    for user in ["asha", "ravi", "sam"] {
        h.members.add_member("T1", user);
    }
    register(&h.registry, "asha", "asha-ios", Platform::Ios).await;
    register(&h.registry, "ravi", "bad-device", Platform::Android).await;
    register(&h.registry, "sam", "sam-web", Platform::Web).await;

    let summary = h
        .service
        .send_trip_update_notification("T1", "Gate changed")
        .await;

    assert_eq!(summary.members, 3);
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.failed, 1);

    let calls = h.sender.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|m| m.title == "Trip Update" && m.body == "Gate changed"));

    assert_eq!(h.service.list_history("asha", 10).await.unwrap().len(), 1);
    assert_eq!(h.service.list_history("sam", 10).await.unwrap().len(), 1);
    assert!(h.service.list_history("ravi", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_broadcast_to_unknown_trip_is_empty() {
    let h = harness(RecordingPushSender::default());

    let summary = h.service.send_trip_update_notification("T404", "hello").await;
    assert_eq!(summary.members, 0);
    assert!(h.sender.calls().is_empty());
}

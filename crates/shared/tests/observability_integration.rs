//! 可观测性模块集成测试
//!
//! 全局 recorder 和日志订阅者每个进程只能安装一次，
//! 因此完整初始化只在一个测试中进行。

use aura_shared::observability::{self, ObservabilityConfig};

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use aura_shared::observability::metrics::{
        record_notification_dispatch, record_push_recipients, record_scheduled_processed,
        record_tokens_deactivated,
    };

    #[test]
    fn test_record_notification_dispatch() {
        record_notification_dispatch("weather_alert", "success", 0.05);
        record_notification_dispatch("delay_alert", "dispatch_error", 1.2);
        record_notification_dispatch("trip_reminder", "no_recipients", 0.001);
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        // 空标签
        record_notification_dispatch("", "", 0.0);

        // 计数为 0 时不写入
        record_push_recipients(0, 0);
        record_tokens_deactivated(0);

        // 极端持续时间
        record_notification_dispatch("booking_confirmation", "success", 999.99);
        record_scheduled_processed("failed");
    }
}

// ============================================================================
// 完整初始化
// ============================================================================

#[tokio::test]
async fn test_init_exposes_notification_metrics() {
    let config = ObservabilityConfig {
        service_name: "observability-it".to_string(),
        log_level: "debug".to_string(),
        // 端口 0 由系统分配，避免与本机已有服务冲突
        metrics_port: 0,
        ..Default::default()
    };

    let guard = observability::init(&config).await.expect("初始化可观测性失败");

    observability::metrics::record_notification_dispatch("itinerary_update", "success", 0.02);
    observability::metrics::record_push_recipients(3, 1);
    observability::metrics::record_tokens_deactivated(1);
    observability::metrics::record_scheduled_processed("sent");

    let rendered = observability::metrics::get_handle()
        .expect("init 之后应存在全局 handle")
        .render();

    assert!(rendered.contains("notifications_sent_total"));
    assert!(rendered.contains(r#"kind="itinerary_update""#));
    assert!(rendered.contains("push_recipients_total"));
    assert!(rendered.contains("device_tokens_deactivated_total"));
    assert!(rendered.contains("scheduled_notifications_processed_total"));
    assert!(rendered.contains("service_starts_total"));

    drop(guard);
}

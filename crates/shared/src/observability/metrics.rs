//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl MetricsHandle {
    /// 停止指标 HTTP 服务器
    pub fn shutdown(self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 和 `/health` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册通知相关指标的描述，出现在 `/metrics` 的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "notifications_sent_total",
        "Total number of notification dispatch attempts by kind and outcome"
    );
    metrics::describe_counter!(
        "push_recipients_total",
        "Total number of push recipients by delivery outcome"
    );
    metrics::describe_counter!(
        "device_tokens_deactivated_total",
        "Total number of device tokens deactivated after provider rejection"
    );
    metrics::describe_counter!(
        "scheduled_notifications_processed_total",
        "Total number of due scheduled notifications processed"
    );
    metrics::describe_histogram!(
        "notification_dispatch_duration_seconds",
        "Notification dispatch duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次通知分发
#[inline]
pub fn record_notification_dispatch(kind: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "notifications_sent_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "notification_dispatch_duration_seconds",
        "kind" => kind.to_string()
    )
    .record(duration_secs);
}

/// 记录推送接收方结果
#[inline]
pub fn record_push_recipients(delivered: u64, failed: u64) {
    if delivered > 0 {
        metrics::counter!("push_recipients_total", "outcome" => "delivered").increment(delivered);
    }
    if failed > 0 {
        metrics::counter!("push_recipients_total", "outcome" => "failed").increment(failed);
    }
}

/// 记录被停用的设备令牌
#[inline]
pub fn record_tokens_deactivated(count: u64) {
    metrics::counter!("device_tokens_deactivated_total").increment(count);
}

/// 记录定时通知处理结果
#[inline]
pub fn record_scheduled_processed(outcome: &str) {
    metrics::counter!(
        "scheduled_notifications_processed_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

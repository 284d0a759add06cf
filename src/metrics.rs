//! Prometheus 指标：轮询次数与耗时、扇出失败数、通知量、未读水位等
//!
//! 通过 `init()` 安装全局 Recorder 并在指定端口暴露抓取端点。

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use crate::sync::PollOutcome;

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// 指标名称
const COUNTER_POLLS: &str = "rentchat_polls_total";
const COUNTER_POLL_FAILURES: &str = "rentchat_poll_failures_total";
const COUNTER_PEER_FAILURES: &str = "rentchat_peer_fetch_failures_total";
const COUNTER_NOTIFICATIONS: &str = "rentchat_notifications_total";
const COUNTER_MESSAGES_SENT: &str = "rentchat_messages_sent_total";
const HISTOGRAM_POLL_DURATION: &str = "rentchat_poll_duration_seconds";
const GAUGE_UNREAD: &str = "rentchat_unread_current";

/// 初始化 Prometheus 指标并启动 HTTP 抓取端点。
/// 仅需在进程内调用一次；重复调用会返回 Err。
pub fn init(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    INITIALIZED
        .set(())
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

/// 是否已初始化
pub fn is_initialized() -> bool {
    INITIALIZED.get().is_some()
}

/// 记录一次成功的轮询：次数、耗时、扇出失败数与通知量。
pub fn record_poll(outcome: &PollOutcome, duration_secs: f64) {
    metrics::counter!(COUNTER_POLLS).increment(1);
    metrics::histogram!(HISTOGRAM_POLL_DURATION).record(duration_secs);
    if outcome.failed_peers > 0 {
        metrics::counter!(COUNTER_PEER_FAILURES).increment(outcome.failed_peers as u64);
    }
    if outcome.notified > 0 {
        metrics::counter!(COUNTER_NOTIFICATIONS).increment(outcome.notified as u64);
    }
}

/// 记录一次整体失败的轮询（网络抖动等，下个周期重试）。
pub fn record_poll_failure() {
    metrics::counter!(COUNTER_POLL_FAILURES).increment(1);
}

/// 记录发送消息数 +1。
pub fn record_message_sent() {
    metrics::counter!(COUNTER_MESSAGES_SENT).increment(1);
}

/// 更新当前未读总数（Gauge）。每轮轮询结束后调用。
pub fn record_unread(count: usize) {
    metrics::gauge!(GAUGE_UNREAD).set(count as f64);
}

use super::*;
use crate::registry::UserSession;

fn report(user_id: &str, loss: f64, ts: u64) -> RtcpReport {
    RtcpReport { user_id: user_id.to_owned(), loss_pct: loss, jitter_ms: 10.0, rtt_ms: 50.0, timestamp_ms: ts }
}

/// Property 2: stored buffer length is min(n, 10), last 10 in insertion order.
#[tokio::test]
async fn collect_keeps_last_ten_in_insertion_order() {
    let collector = RtcpCollector::new();
    for i in 0..15u64 {
        collector.collect(report("a", 0.0, i)).await;
    }

    let reports = collector.reports.read().await;
    let window = reports.get("a").expect("window exists");
    assert_eq!(window.len(), 10);
    let timestamps: Vec<u64> = window.iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(timestamps, (5..15).collect::<Vec<_>>());
}

#[tokio::test]
async fn collect_clamps_loss_into_unit_interval() {
    let collector = RtcpCollector::new();
    collector.collect(report("a", 1.5, 0)).await;
    collector.collect(report("a", -0.3, 1)).await;

    let reports = collector.reports.read().await;
    let window = reports.get("a").unwrap();
    assert_eq!(window[0].loss_pct, 1.0);
    assert_eq!(window[1].loss_pct, 0.0);
}

#[tokio::test]
async fn worst_loss_zero_for_absent_or_empty_meeting() {
    let registry = MeetingRegistry::new();
    let collector = RtcpCollector::new();
    assert_eq!(collector.worst_loss(&registry, "ghost").await, 0.0);
}

#[tokio::test]
async fn worst_loss_uses_most_recent_report_not_average() {
    let registry = MeetingRegistry::new();
    let collector = RtcpCollector::new();
    registry.register_user("m1", UserSession::new("a", "pc-a", 0)).await;
    registry.register_user("m1", UserSession::new("b", "pc-b", 0)).await;

    collector.collect(report("a", 0.01, 0)).await;
    collector.collect(report("a", 0.06, 1)).await; // spike is the latest sample
    collector.collect(report("b", 0.0, 0)).await;

    assert_eq!(collector.worst_loss(&registry, "m1").await, 0.06);
}

#[tokio::test]
async fn worst_loss_ignores_users_no_longer_in_meeting() {
    let registry = MeetingRegistry::new();
    let collector = RtcpCollector::new();
    registry.register_user("m1", UserSession::new("a", "pc-a", 0)).await;
    collector.collect(report("a", 0.5, 0)).await;
    // "b" reported a spike but never joined m1 — must not influence worst_loss.
    collector.collect(report("b", 0.9, 0)).await;

    assert_eq!(collector.worst_loss(&registry, "m1").await, 0.5);
}

#[tokio::test]
async fn metrics_averages_across_all_reports_of_all_members() {
    let registry = MeetingRegistry::new();
    let collector = RtcpCollector::new();
    registry.register_user("m1", UserSession::new("a", "pc-a", 0)).await;
    registry.register_user("m1", UserSession::new("b", "pc-b", 0)).await;

    collector.collect(report("a", 0.0, 0)).await;
    collector.collect(report("a", 0.1, 1)).await;
    collector.collect(report("b", 0.2, 0)).await;

    let metrics = collector.metrics(&registry, "m1").await;
    assert!((metrics.avg_loss - 0.1).abs() < 1e-9);
    assert!((metrics.worst_loss - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn metrics_all_zero_when_empty() {
    let registry = MeetingRegistry::new();
    let collector = RtcpCollector::new();
    let metrics = collector.metrics(&registry, "ghost").await;
    assert_eq!(metrics.avg_loss, 0.0);
    assert_eq!(metrics.worst_loss, 0.0);
}

#[tokio::test]
async fn cleanup_user_removes_window() {
    let collector = RtcpCollector::new();
    collector.collect(report("a", 0.1, 0)).await;
    collector.cleanup_user("a").await;
    assert!(collector.reports.read().await.get("a").is_none());
}

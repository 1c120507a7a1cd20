//! 监视器运行指标
//!
//! 所有计数器都是原子变量，可以在任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 监视器实时指标
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    /// 从串口读取的总字节数
    pub bytes_read: AtomicU64,
    /// 解析出的帧数
    pub frames_parsed: AtomicU64,
    /// 同一批次中被更新帧取代的帧数（只投递最后一帧）
    pub frames_superseded: AtomicU64,
    /// 无目标（moving 与 stationary 均为 false）的事件数
    pub events_without_target: AtomicU64,
    /// 因去抖被丢弃的事件数
    pub events_debounced: AtomicU64,
    /// 通过去抖并转发的事件数
    pub events_forwarded: AtomicU64,
    /// Queued 模式下队列满被丢弃的事件数
    pub events_dropped: AtomicU64,
    /// 串口读错误次数
    pub read_errors: AtomicU64,
    /// 回调返回错误的次数
    pub handler_errors: AtomicU64,
    /// 回调 panic 的次数
    pub handler_panics: AtomicU64,
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            frames_parsed: self.frames_parsed.load(Ordering::Relaxed),
            frames_superseded: self.frames_superseded.load(Ordering::Relaxed),
            events_without_target: self.events_without_target.load(Ordering::Relaxed),
            events_debounced: self.events_debounced.load(Ordering::Relaxed),
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.bytes_read.store(0, Ordering::Relaxed);
        self.frames_parsed.store(0, Ordering::Relaxed);
        self.frames_superseded.store(0, Ordering::Relaxed);
        self.events_without_target.store(0, Ordering::Relaxed);
        self.events_debounced.store(0, Ordering::Relaxed);
        self.events_forwarded.store(0, Ordering::Relaxed);
        self.events_dropped.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
        self.handler_errors.store(0, Ordering::Relaxed);
        self.handler_panics.store(0, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub bytes_read: u64,
    pub frames_parsed: u64,
    pub frames_superseded: u64,
    pub events_without_target: u64,
    pub events_debounced: u64,
    pub events_forwarded: u64,
    pub events_dropped: u64,
    pub read_errors: u64,
    pub handler_errors: u64,
    pub handler_panics: u64,
}

impl MetricsSnapshot {
    /// 去抖丢弃率（百分比），没有带目标的事件时返回 0.0
    pub fn debounce_rate(&self) -> f64 {
        let total = self.events_debounced + self.events_forwarded;
        if total == 0 {
            return 0.0;
        }
        (self.events_debounced as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = MonitorMetrics::new();
        MonitorMetrics::add(&metrics.bytes_read, 14);
        MonitorMetrics::add(&metrics.events_forwarded, 1);
        MonitorMetrics::add(&metrics.events_debounced, 3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bytes_read, 14);
        assert_eq!(snapshot.events_forwarded, 1);
        assert!((snapshot.debounce_rate() - 75.0).abs() < f64::EPSILON);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert_eq!(MetricsSnapshot::default().debounce_rate(), 0.0);
    }
}

//! 事件去抖

use std::time::{Duration, Instant};

/// 最小间隔去抖器
///
/// 只有距上一次**放行**的事件不少于 `min_interval` 时才放行；被拒绝的事件不更新计时。
#[derive(Debug, Clone)]
pub struct Debouncer {
    min_interval: Duration,
    last_forwarded: Option<Instant>,
}

impl Debouncer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_forwarded: None,
        }
    }

    /// 判断 `now` 时刻的事件是否放行；放行时记录时间
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_forwarded
            && now.saturating_duration_since(last) < self.min_interval
        {
            return false;
        }
        self.last_forwarded = Some(now);
        true
    }

    pub fn last_forwarded(&self) -> Option<Instant> {
        self.last_forwarded
    }

    pub fn reset(&mut self) {
        self.last_forwarded = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_window() {
        let base = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));

        assert!(debouncer.admit(base));
        assert!(!debouncer.admit(base + Duration::from_millis(200)));
        assert!(debouncer.admit(base + Duration::from_millis(600)));
        assert_eq!(
            debouncer.last_forwarded(),
            Some(base + Duration::from_millis(600))
        );
    }

    #[test]
    fn test_rejected_event_does_not_extend_window() {
        let base = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));

        assert!(debouncer.admit(base));
        assert!(!debouncer.admit(base + Duration::from_millis(400)));
        // 以第一次放行为基准，而不是被拒绝的 400ms
        assert!(debouncer.admit(base + Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let base = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);
        assert!(debouncer.admit(base));
        assert!(debouncer.admit(base));

        debouncer.reset();
        assert_eq!(debouncer.last_forwarded(), None);
    }
}

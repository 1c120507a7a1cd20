//! 监视器配置

use radarcam_protocol::FrameStrategy;
use std::time::Duration;

/// 无数据时的轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 两次转发事件之间的最小间隔
pub const DEFAULT_MIN_EVENT_INTERVAL: Duration = Duration::from_millis(500);

/// 回调派发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// 在监视线程上同步执行回调
    #[default]
    Inline,
    /// 经有界队列交给单个 worker 线程
    Queued { capacity: usize },
}

impl DispatchMode {
    /// 创建 Queued 模式（容量至少为 1）
    pub fn queued(capacity: usize) -> Self {
        Self::Queued {
            capacity: capacity.max(1),
        }
    }
}

/// 监视器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// 帧格式
    pub strategy: FrameStrategy,
    /// 无数据（或读错误）时的休眠时长
    pub poll_interval: Duration,
    /// 去抖间隔，从上一次**转发**的事件开始计算
    pub min_event_interval: Duration,
    /// 回调派发方式
    pub dispatch: DispatchMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            strategy: FrameStrategy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_event_interval: DEFAULT_MIN_EVENT_INTERVAL,
            dispatch: DispatchMode::default(),
        }
    }
}

impl MonitorConfig {
    pub fn with_strategy(mut self, strategy: FrameStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_min_event_interval(mut self, interval: Duration) -> Self {
        self.min_event_interval = interval;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }
}

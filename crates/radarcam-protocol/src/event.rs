//! 检测事件

use crate::constants::*;
use crate::frame::{Frame, FramePayload, FrameStrategy};
use bytes::Bytes;
use std::time::{Instant, SystemTime};

/// 检测事件
///
/// 由恰好一个 [`Frame`] 派生。生命周期：解析器创建 → 监视器去抖逻辑消费一次 →
/// 被丢弃（间隔不足）或转发给回调。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    /// 是否存在运动目标
    pub moving: bool,
    /// 是否存在静止目标
    pub stationary: bool,
    /// 目标距离（厘米），Sentinel 格式恒为 0
    pub distance_cm: u32,
    /// 信号强度
    pub signal_strength: u8,
    /// 原始帧字节
    pub raw: Bytes,
    /// 帧提取时刻（单调时钟）
    pub timestamp: Instant,
    /// 帧提取时刻（墙上时钟，仅用于日志）
    pub wall_clock: SystemTime,
}

impl DetectionEvent {
    /// 是否检测到任意目标（运动或静止）
    pub fn has_target(&self) -> bool {
        self.moving || self.stationary
    }
}

impl From<&Frame> for DetectionEvent {
    fn from(frame: &Frame) -> Self {
        let (moving, stationary, distance_cm) = match (frame.strategy(), frame.payload()) {
            (
                _,
                FramePayload::Bounded {
                    target_state,
                    distance_raw,
                    ..
                },
            ) => (
                target_state & TARGET_STATE_MOVING != 0,
                target_state & TARGET_STATE_STATIONARY != 0,
                u32::from(distance_raw) * DISTANCE_UNIT_CM,
            ),
            (FrameStrategy::Sentinel { motion_threshold }, FramePayload::Sentinel { signal_strength }) => {
                (signal_strength >= motion_threshold, false, 0)
            },
            (FrameStrategy::Bounded, FramePayload::Sentinel { signal_strength }) => {
                (signal_strength >= DEFAULT_MOTION_THRESHOLD, false, 0)
            },
        };

        Self {
            moving,
            stationary,
            distance_cm,
            signal_strength: frame.payload().signal_strength(),
            raw: frame.raw().clone(),
            timestamp: frame.captured_at(),
            wall_clock: frame.wall_clock(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(strategy: FrameStrategy, raw: &[u8]) -> Frame {
        Frame::decode(strategy, raw, Instant::now(), SystemTime::now()).unwrap()
    }

    #[test]
    fn test_bounded_target_state_bits() {
        let cases = [
            (0x00, false, false),
            (0x01, true, false),
            (0x02, false, true),
            (0x03, true, true),
        ];
        for (state, moving, stationary) in cases {
            let f = frame(FrameStrategy::Bounded, &[0xF8, state, 0, 25, 60, 0, 0xFE]);
            let event = DetectionEvent::from(&f);
            assert_eq!(event.moving, moving, "state=0x{state:02X}");
            assert_eq!(event.stationary, stationary, "state=0x{state:02X}");
            assert_eq!(event.has_target(), moving || stationary);
        }
    }

    #[test]
    fn test_bounded_distance_in_cm() {
        let f = frame(FrameStrategy::Bounded, &[0xF8, 0x01, 0, 25, 60, 0, 0xFE]);
        let event = DetectionEvent::from(&f);
        assert_eq!(event.distance_cm, 250);
        assert_eq!(event.signal_strength, 60);
        assert_eq!(event.timestamp, f.captured_at());
    }

    #[test]
    fn test_sentinel_threshold() {
        let strategy = FrameStrategy::Sentinel {
            motion_threshold: 140,
        };
        let below = DetectionEvent::from(&frame(strategy, &[0x00, b'b', b'n', 0x02, 139]));
        assert!(!below.has_target());

        let at = DetectionEvent::from(&frame(strategy, &[0x00, b'b', b'n', 0x02, 140]));
        assert!(at.moving);
        assert!(!at.stationary);
        assert_eq!(at.distance_cm, 0);
        assert_eq!(at.signal_strength, 140);
    }
}

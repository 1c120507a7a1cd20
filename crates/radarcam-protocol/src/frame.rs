//! 帧格式定义与单帧解码

use crate::ProtocolError;
use crate::constants::*;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::time::{Instant, SystemTime};

/// 帧格式策略
///
/// 同一传感器家族的两种串口格式，构造解析器时选定，运行期间不切换。
///
/// - `Bounded`: 7 字节帧，`0xF8` 帧头 + `0xFE` 帧尾，携带目标状态和距离
/// - `Sentinel`: 4 字节哨兵 `00 'b' 'n' 02` + 1 字节信号强度，无距离信息
///
/// # Example
///
/// ```
/// use radarcam_protocol::FrameStrategy;
///
/// let strategy: FrameStrategy = "sentinel".parse().unwrap();
/// assert_eq!(strategy.frame_len(), 5);
/// assert_eq!(strategy.with_motion_threshold(100), FrameStrategy::Sentinel { motion_threshold: 100 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum FrameStrategy {
    /// 帧头/帧尾界定的 7 字节帧
    Bounded,
    /// 哨兵 + 信号强度
    Sentinel {
        /// 信号强度 >= 此阈值视为运动目标
        motion_threshold: u8,
    },
}

impl Default for FrameStrategy {
    fn default() -> Self {
        Self::Bounded
    }
}

impl FrameStrategy {
    /// 单帧字节长度
    pub const fn frame_len(&self) -> usize {
        match self {
            Self::Bounded => BOUNDED_FRAME_LEN,
            Self::Sentinel { .. } => SENTINEL_FRAME_LEN,
        }
    }

    /// 设置运动阈值（仅对 `Sentinel` 生效，`Bounded` 原样返回）
    pub const fn with_motion_threshold(self, motion_threshold: u8) -> Self {
        match self {
            Self::Bounded => Self::Bounded,
            Self::Sentinel { .. } => Self::Sentinel { motion_threshold },
        }
    }

    /// 策略名称（与 `FromStr` 互逆）
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bounded => "bounded",
            Self::Sentinel { .. } => "sentinel",
        }
    }

    /// 解码一个完整帧
    ///
    /// `raw` 必须恰好是一帧的长度；帧头/帧尾/哨兵任何一处不匹配都返回错误。
    pub fn decode(&self, raw: &[u8]) -> Result<FramePayload, ProtocolError> {
        let expected = self.frame_len();
        if raw.len() != expected {
            return Err(ProtocolError::InvalidLength {
                expected,
                actual: raw.len(),
            });
        }

        match self {
            Self::Bounded => {
                if raw[0] != BOUNDED_HEADER {
                    return Err(ProtocolError::InvalidDelimiter {
                        offset: 0,
                        expected: BOUNDED_HEADER,
                        actual: raw[0],
                    });
                }
                let last = BOUNDED_FRAME_LEN - 1;
                if raw[last] != BOUNDED_TAIL {
                    return Err(ProtocolError::InvalidDelimiter {
                        offset: last,
                        expected: BOUNDED_TAIL,
                        actual: raw[last],
                    });
                }
                Ok(FramePayload::Bounded {
                    target_state: raw[BOUNDED_OFFSET_TARGET_STATE],
                    distance_raw: raw[BOUNDED_OFFSET_DISTANCE],
                    signal_strength: raw[BOUNDED_OFFSET_SIGNAL],
                })
            },
            Self::Sentinel { .. } => {
                let mut window = [0u8; 4];
                window.copy_from_slice(&raw[..SENTINEL.len()]);
                if window != SENTINEL {
                    return Err(ProtocolError::SentinelMismatch(window));
                }
                Ok(FramePayload::Sentinel {
                    signal_strength: raw[SENTINEL.len()],
                })
            },
        }
    }
}

impl FromStr for FrameStrategy {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bounded" | "a" => Ok(Self::Bounded),
            "sentinel" | "b" => Ok(Self::Sentinel {
                motion_threshold: DEFAULT_MOTION_THRESHOLD,
            }),
            other => Err(ProtocolError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for FrameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 帧内字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePayload {
    Bounded {
        target_state: u8,
        distance_raw: u8,
        signal_strength: u8,
    },
    Sentinel {
        signal_strength: u8,
    },
}

impl FramePayload {
    pub const fn signal_strength(&self) -> u8 {
        match *self {
            Self::Bounded {
                signal_strength, ..
            }
            | Self::Sentinel { signal_strength } => signal_strength,
        }
    }
}

/// 从字节流中提取出的完整帧
///
/// 提取后不可变；持有原始字节的副本（用于诊断日志）。
/// `captured_at` 在提取时刻设置，而不是第一个字节到达的时刻，
/// 保证全系统的冷却/去抖比较使用同一时间基准。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    strategy: FrameStrategy,
    payload: FramePayload,
    raw: Bytes,
    captured_at: Instant,
    wall_clock: SystemTime,
}

impl Frame {
    /// 解码并构造帧
    pub fn decode(
        strategy: FrameStrategy,
        raw: &[u8],
        captured_at: Instant,
        wall_clock: SystemTime,
    ) -> Result<Self, ProtocolError> {
        let payload = strategy.decode(raw)?;
        Ok(Self {
            strategy,
            payload,
            raw: Bytes::copy_from_slice(raw),
            captured_at,
            wall_clock,
        })
    }

    pub fn strategy(&self) -> FrameStrategy {
        self.strategy
    }

    pub fn payload(&self) -> FramePayload {
        self.payload
    }

    /// 原始帧字节
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// 提取时刻（单调时钟）
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// 提取时刻（墙上时钟，仅用于日志）
    pub fn wall_clock(&self) -> SystemTime {
        self.wall_clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded(state: u8, dist: u8, signal: u8) -> [u8; 7] {
        [BOUNDED_HEADER, state, 0x00, dist, signal, 0x00, BOUNDED_TAIL]
    }

    #[test]
    fn test_decode_bounded() {
        let payload = FrameStrategy::Bounded.decode(&bounded(0x03, 12, 80)).unwrap();
        assert_eq!(
            payload,
            FramePayload::Bounded {
                target_state: 0x03,
                distance_raw: 12,
                signal_strength: 80
            }
        );
        assert_eq!(payload.signal_strength(), 80);
    }

    #[test]
    fn test_decode_bounded_bad_tail() {
        let mut raw = bounded(0x01, 1, 1);
        raw[6] = 0x00;
        let err = FrameStrategy::Bounded.decode(&raw).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidDelimiter {
                offset: 6,
                expected: BOUNDED_TAIL,
                actual: 0x00
            }
        );
    }

    #[test]
    fn test_decode_wrong_length() {
        let err = FrameStrategy::Bounded.decode(&[BOUNDED_HEADER, 0, BOUNDED_TAIL]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidLength {
                expected: 7,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_decode_sentinel() {
        let strategy = FrameStrategy::Sentinel {
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
        };
        let payload = strategy.decode(&[0x00, b'b', b'n', 0x02, 200]).unwrap();
        assert_eq!(payload, FramePayload::Sentinel { signal_strength: 200 });

        let err = strategy.decode(&[0x00, b'b', b'x', 0x02, 200]).unwrap_err();
        assert!(matches!(err, ProtocolError::SentinelMismatch(_)));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("Bounded".parse::<FrameStrategy>().unwrap(), FrameStrategy::Bounded);
        assert_eq!(
            " sentinel ".parse::<FrameStrategy>().unwrap(),
            FrameStrategy::Sentinel {
                motion_threshold: DEFAULT_MOTION_THRESHOLD
            }
        );
        assert!(matches!(
            "checksum".parse::<FrameStrategy>(),
            Err(ProtocolError::UnknownStrategy(s)) if s == "checksum"
        ));
    }

    #[test]
    fn test_with_motion_threshold_ignored_for_bounded() {
        assert_eq!(
            FrameStrategy::Bounded.with_motion_threshold(10),
            FrameStrategy::Bounded
        );
    }

    #[test]
    fn test_frame_keeps_raw_copy() {
        let raw = bounded(0x01, 5, 9);
        let frame =
            Frame::decode(FrameStrategy::Bounded, &raw, Instant::now(), SystemTime::now()).unwrap();
        assert_eq!(frame.raw().as_ref(), &raw);
        assert_eq!(frame.strategy(), FrameStrategy::Bounded);
    }
}

//! 协议常量定义
//!
//! 集中定义帧格式相关的常量，避免在解析代码中散落"魔法数"。

/// Bounded 帧头
pub const BOUNDED_HEADER: u8 = 0xF8;

/// Bounded 帧尾
pub const BOUNDED_TAIL: u8 = 0xFE;

/// Bounded 帧总长度（含帧头帧尾）
pub const BOUNDED_FRAME_LEN: usize = 7;

/// Bounded 帧内字段偏移
pub const BOUNDED_OFFSET_TARGET_STATE: usize = 1;
pub const BOUNDED_OFFSET_DISTANCE: usize = 3;
pub const BOUNDED_OFFSET_SIGNAL: usize = 4;

/// 目标状态位：运动目标
pub const TARGET_STATE_MOVING: u8 = 0x01;

/// 目标状态位：静止目标
pub const TARGET_STATE_STATIONARY: u8 = 0x02;

/// 距离原始值单位（1 个单位 = 10 cm）
pub const DISTANCE_UNIT_CM: u32 = 10;

/// Sentinel 格式的 4 字节哨兵：`00 'b' 'n' 02`
pub const SENTINEL: [u8; 4] = [0x00, b'b', b'n', 0x02];

/// Sentinel 帧总长度（哨兵 + 1 字节信号强度）
pub const SENTINEL_FRAME_LEN: usize = SENTINEL.len() + 1;

/// Sentinel 格式默认运动阈值
///
/// 信号强度 >= 阈值即视为运动目标。
pub const DEFAULT_MOTION_THRESHOLD: u8 = 140;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_lengths() {
        assert_eq!(BOUNDED_FRAME_LEN, 7);
        assert_eq!(SENTINEL_FRAME_LEN, 5);
        assert_eq!(&SENTINEL[1..3], b"bn");
    }

    #[test]
    fn test_field_offsets_inside_frame() {
        assert!(BOUNDED_OFFSET_TARGET_STATE < BOUNDED_FRAME_LEN - 1);
        assert!(BOUNDED_OFFSET_DISTANCE < BOUNDED_FRAME_LEN - 1);
        assert!(BOUNDED_OFFSET_SIGNAL < BOUNDED_FRAME_LEN - 1);
    }
}

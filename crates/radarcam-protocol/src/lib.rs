//! # radarcam Protocol
//!
//! LD2410 系列雷达串口帧协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 帧头、帧尾、哨兵等协议常量
//! - `frame`: 帧格式（`FrameStrategy`）与单帧解码
//! - `event`: 由帧派生的 `DetectionEvent`
//! - `parser`: 增量（流式）帧解析器
//!
//! ## 两种帧格式
//!
//! 同一传感器家族存在两种互不兼容的串口格式，在构造时通过 [`FrameStrategy`] 选择：
//!
//! ```text
//! Bounded  (7 bytes): F8 | state | rsv | dist | signal | rsv | FE
//! Sentinel (5 bytes): 00 'b' 'n' 02 | signal
//! ```

pub mod constants;
pub mod event;
pub mod frame;
pub mod parser;

pub use constants::*;
pub use event::DetectionEvent;
pub use frame::{Frame, FramePayload, FrameStrategy};
pub use parser::{FrameParser, ParseOutcome, parse};

use thiserror::Error;

/// 协议层错误
///
/// 解析器内部使用（对应"噪声跳过"），不会从 [`FrameParser`] 向调用方抛出。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid frame delimiter at offset {offset}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    InvalidDelimiter {
        offset: usize,
        expected: u8,
        actual: u8,
    },

    #[error("Sentinel mismatch: {0:02X?}")]
    SentinelMismatch([u8; 4]),

    #[error("Unknown frame strategy: {0}")]
    UnknownStrategy(String),
}

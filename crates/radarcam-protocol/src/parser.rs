//! 增量帧解析器
//!
//! 给定"上次未消费的尾部 + 新到达的字节"，产出零个或多个完整帧，
//! 并返回未消费部分供下一次调用。解析器从不阻塞，容忍跨读取边界的半帧。
//!
//! # 噪声容忍
//!
//! 格式错误的片段（有帧头无帧尾、截断、哨兵不完整）不产生帧，也不报错，
//! 直接跳过。已确定无法成为帧起点的字节会被消费掉，因此保留的尾部
//! 始终小于一帧长度。
//!
//! # Example
//!
//! ```
//! use radarcam_protocol::{FrameParser, FrameStrategy};
//!
//! let mut parser = FrameParser::new(FrameStrategy::Bounded);
//!
//! // 帧被拆成两次读取
//! assert!(parser.feed(&[0x11, 0xF8, 0x01, 0x00]).is_empty());
//! let frames = parser.feed(&[0x0A, 0x50, 0x00, 0xFE, 0x22]);
//! assert_eq!(frames.len(), 1);
//! assert!(parser.pending().is_empty());
//! ```

use crate::constants::*;
use crate::frame::{Frame, FrameStrategy};
use std::time::{Instant, SystemTime};

/// 单次解析结果
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// 按出现顺序排列的完整帧
    pub frames: Vec<Frame>,
    /// 已消费的字节数；`buf[consumed..]` 为需要保留到下一次的尾部
    pub consumed: usize,
}

impl ParseOutcome {
    /// 本批次最后一个帧（最新者胜出）
    pub fn latest(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// 未消费的尾部
    pub fn remainder<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.consumed.min(buf.len())..]
    }
}

/// 解析一段缓冲区（无状态）
///
/// 所有帧共用同一个提取时刻。
pub fn parse(strategy: FrameStrategy, buf: &[u8]) -> ParseOutcome {
    let captured_at = Instant::now();
    let wall_clock = SystemTime::now();

    match strategy {
        FrameStrategy::Bounded => scan_bounded(strategy, buf, captured_at, wall_clock),
        FrameStrategy::Sentinel { .. } => scan_sentinel(strategy, buf, captured_at, wall_clock),
    }
}

/// Bounded 扫描
///
/// 每个 `0xF8` 都是候选帧头，仅当其后第 6 个字节为 `0xFE` 时有效。
/// 某偏移处匹配成功后从帧尾之后继续扫描，帧内部的伪帧头被忽略。
fn scan_bounded(
    strategy: FrameStrategy,
    buf: &[u8],
    captured_at: Instant,
    wall_clock: SystemTime,
) -> ParseOutcome {
    let mut frames = Vec::new();
    let mut i = 0;

    while i < buf.len() {
        if buf[i] != BOUNDED_HEADER {
            i += 1;
            continue;
        }

        let end = i + BOUNDED_FRAME_LEN;
        if end > buf.len() {
            // 帧头距离缓冲区末尾不足一帧，无法判定，留给下一次
            return ParseOutcome {
                frames,
                consumed: i,
            };
        }

        match Frame::decode(strategy, &buf[i..end], captured_at, wall_clock) {
            Ok(frame) => {
                frames.push(frame);
                i = end;
            },
            Err(_) => i += 1,
        }
    }

    ParseOutcome {
        frames,
        consumed: buf.len(),
    }
}

/// Sentinel 扫描
///
/// 维护 4 字节滑动窗口；窗口等于哨兵时，下一个字节即信号强度。
fn scan_sentinel(
    strategy: FrameStrategy,
    buf: &[u8],
    captured_at: Instant,
    wall_clock: SystemTime,
) -> ParseOutcome {
    let n = SENTINEL.len();
    let mut frames = Vec::new();
    let mut i = 0;

    while i + n <= buf.len() {
        if buf[i..i + n] != SENTINEL {
            i += 1;
            continue;
        }

        let end = i + SENTINEL_FRAME_LEN;
        if end > buf.len() {
            // 哨兵完整但信号字节还没到
            return ParseOutcome {
                frames,
                consumed: i,
            };
        }

        if let Ok(frame) = Frame::decode(strategy, &buf[i..end], captured_at, wall_clock) {
            frames.push(frame);
        }
        i = end;
    }

    // 剩余不足 4 字节：只保留可能是哨兵前缀的部分
    let consumed = (i..buf.len())
        .find(|&j| SENTINEL.starts_with(&buf[j..]))
        .unwrap_or(buf.len());

    ParseOutcome { frames, consumed }
}

/// 带内部尾部缓冲的流式解析器
#[derive(Debug, Clone)]
pub struct FrameParser {
    strategy: FrameStrategy,
    pending: Vec<u8>,
}

impl FrameParser {
    pub fn new(strategy: FrameStrategy) -> Self {
        Self {
            strategy,
            pending: Vec::with_capacity(strategy.frame_len() * 8),
        }
    }

    pub fn strategy(&self) -> FrameStrategy {
        self.strategy
    }

    /// 追加新字节并提取所有完整帧
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(bytes);
        let outcome = parse(self.strategy, &self.pending);
        self.pending.drain(..outcome.consumed);
        outcome.frames
    }

    /// 当前保留的未消费字节
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// 丢弃保留的尾部（例如串口重新打开后）
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

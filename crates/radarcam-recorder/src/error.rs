//! 录像层错误类型定义

use std::io;
use thiserror::Error;

/// 摄像头 / 采集后端错误
#[derive(Error, Debug)]
pub enum CaptureError {
    /// 后端进程无法启动
    #[error("Failed to launch capture process `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// 采集进程异常退出
    #[error("Capture process exited unexpectedly ({0})")]
    Exited(String),

    /// 已有采集在进行
    #[error("Capture already started")]
    AlreadyStarted,

    /// 没有正在进行的采集
    #[error("Capture not started")]
    NotStarted,

    /// 设备层错误
    #[error("Camera device error: {0}")]
    Device(String),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

/// 录像协调器错误
#[derive(Error, Debug)]
pub enum RecordingError {
    /// 已有录制会话在进行，本次触发被跳过
    #[error("Already recording, skipping this trigger")]
    AlreadyRecording,

    /// 初始化或采集失败；状态已复位
    #[error("Recording failed: {0}")]
    RecordingFailed(#[from] CaptureError),
}

impl RecordingError {
    /// 是否为策略性拒绝（不是故障）
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::AlreadyRecording)
    }
}

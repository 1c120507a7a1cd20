//! 录制状态与产物

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// 录制状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// 空闲
    #[default]
    Idle,
    /// 录制中
    InProgress { started_at: DateTime<Local> },
}

impl RecordingState {
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::InProgress { .. })
    }
}

/// 一次成功录制的产物，交给上传协调器消费一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
}

impl RecordingArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件名部分（远端路径使用）
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

//! 采集后端抽象

use crate::camera::CameraConfig;
use crate::error::CaptureError;
use std::path::Path;

/// 采集后端：按配置打开一个摄像头设备
///
/// 录像协调器最多成功调用一次 `open()`；失败时在下一次触发重试。
pub trait CaptureBackend: Send {
    fn open(&mut self, config: &CameraConfig) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

/// 已打开的摄像头设备
pub trait CaptureDevice: Send {
    /// 开始录制到 `path`
    fn start_recording(&mut self, path: &Path, bitrate: u32) -> Result<(), CaptureError>;

    /// 停止当前录制并完成文件写入
    fn stop_recording(&mut self) -> Result<(), CaptureError>;

    /// 释放设备
    fn close(&mut self) -> Result<(), CaptureError>;
}

impl CaptureBackend for Box<dyn CaptureBackend> {
    fn open(&mut self, config: &CameraConfig) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        (**self).open(config)
    }
}

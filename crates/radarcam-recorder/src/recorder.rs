//! 录像协调器

use crate::camera::CameraConfig;
use crate::device::{CaptureBackend, CaptureDevice};
use crate::error::{CaptureError, RecordingError};
use crate::state::{RecordingArtifact, RecordingState};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 录像文件名：`motion_YYYYmmdd_HHMMSS.mp4`
pub fn recording_file_name(timestamp: &DateTime<Local>) -> String {
    format!("motion_{}.mp4", timestamp.format("%Y%m%d_%H%M%S"))
}

/// 后端与懒加载的设备句柄
struct DeviceSlot {
    backend: Box<dyn CaptureBackend>,
    device: Option<Box<dyn CaptureDevice>>,
}

/// 录像协调器
///
/// 多线程共享（`&self` 接口）。状态锁只在检查/切换状态时短暂持有；
/// 设备锁在整个录制期间持有，`cleanup()` 会等待正在进行的录制结束。
pub struct Recorder {
    state: Mutex<RecordingState>,
    slot: Mutex<DeviceSlot>,
    camera: CameraConfig,
    recordings_dir: PathBuf,
}

/// 进入 `InProgress` 后持有，Drop 时复位为 `Idle`（包括 panic 展开）
struct InProgressGuard<'a> {
    state: &'a Mutex<RecordingState>,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = RecordingState::Idle;
    }
}

impl Recorder {
    pub fn new(
        backend: impl CaptureBackend + 'static,
        camera: CameraConfig,
        recordings_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state: Mutex::new(RecordingState::Idle),
            slot: Mutex::new(DeviceSlot {
                backend: Box::new(backend),
                device: None,
            }),
            camera,
            recordings_dir: recordings_dir.into(),
        }
    }

    pub fn camera(&self) -> &CameraConfig {
        &self.camera
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    pub fn state(&self) -> RecordingState {
        *self.state.lock()
    }

    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    /// 设备是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.slot.lock().device.is_some()
    }

    /// 录制 `duration` 时长的视频
    ///
    /// 忙时立即返回 [`RecordingError::AlreadyRecording`]；
    /// 阻塞调用线程直到录制结束。
    pub fn record(&self, duration: Duration) -> Result<RecordingArtifact, RecordingError> {
        let _guard = self.begin()?;

        let mut slot = self.slot.lock();
        self.capture(&mut slot, duration).map_err(|e| {
            error!("Error during recording: {}", e);
            RecordingError::RecordingFailed(e)
        })
    }

    fn begin(&self) -> Result<InProgressGuard<'_>, RecordingError> {
        let mut state = self.state.lock();
        if state.is_recording() {
            info!("Already recording, skipping this trigger");
            return Err(RecordingError::AlreadyRecording);
        }
        *state = RecordingState::InProgress {
            started_at: Local::now(),
        };
        Ok(InProgressGuard { state: &self.state })
    }

    fn capture(
        &self,
        slot: &mut DeviceSlot,
        duration: Duration,
    ) -> Result<RecordingArtifact, CaptureError> {
        fs::create_dir_all(&self.recordings_dir)?;

        let device = match &mut slot.device {
            Some(device) => device,
            empty => {
                debug!(
                    "Initializing camera: {}x{} @ {} fps, crop {:?}, rotation {}, hflip {}, vflip {}",
                    self.camera.width,
                    self.camera.height,
                    self.camera.fps,
                    self.camera.crop_rect(),
                    self.camera.rotation.degrees(),
                    self.camera.hflip,
                    self.camera.vflip,
                );
                empty.insert(slot.backend.open(&self.camera)?)
            },
        };

        let created_at = Local::now();
        let path = self.recordings_dir.join(recording_file_name(&created_at));

        device.start_recording(&path, self.camera.bitrate)?;
        info!("Starting {} second recording...", duration.as_secs_f64());
        thread::sleep(duration);
        device.stop_recording()?;
        info!("Recording complete: {}", path.display());

        Ok(RecordingArtifact { path, created_at })
    }

    /// 关闭已初始化的设备；未初始化时什么也不做
    pub fn cleanup(&self) {
        let mut slot = self.slot.lock();
        if let Some(mut device) = slot.device.take() {
            match device.close() {
                Ok(()) => info!("Camera closed"),
                Err(e) => warn!("Error closing camera: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_recording_file_name() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(recording_file_name(&ts), "motion_20240309_070501.mp4");
    }
}

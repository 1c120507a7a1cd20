//! # radarcam Recorder
//!
//! 录像协调层：检测触发 → 跳过或录制固定时长 → 产出 MP4 文件。
//!
//! - 同一时刻最多一个录制会话，忙时直接返回 [`RecordingError::AlreadyRecording`]，不排队
//! - 摄像头在第一次触发时按 [`CameraConfig`] 初始化一次，之后复用
//! - 任何退出路径（包括 panic）都会把状态复位为 `Idle`

pub mod camera;
pub mod device;
pub mod error;
pub mod recorder;
pub mod state;

#[cfg(feature = "rpicam")]
pub mod rpicam;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use camera::{CameraConfig, CropRect, DEFAULT_BITRATE, Rotation, Zoom};
pub use device::{CaptureBackend, CaptureDevice};
pub use error::{CaptureError, RecordingError};
pub use recorder::{Recorder, recording_file_name};
pub use state::{RecordingArtifact, RecordingState};

#[cfg(feature = "rpicam")]
pub use rpicam::RpicamBackend;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCamera, MockCameraHandle};

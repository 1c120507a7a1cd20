//! # radarcam SDK
//!
//! LD2410 雷达触发的安防摄像头。
//!
//! 一个监视线程读取雷达串口；检测到目标（且不在冷却期内）时录制固定时长的视频，
//! 录制成功后可选地通过 FTP 上传并删除本地文件。
//!
//! ```text
//! 串口 ─► SensorMonitor ─► DetectionPipeline ─► Recorder ─► Uploader
//!          (去抖 500ms)       (冷却 5s)          (忙则跳过)   (串行化)
//! ```

pub mod cam;
pub mod config;
pub mod logging;
pub mod pipeline;

pub use cam::{SecurityCam, SecurityCamBuilder, SecurityCamError};
pub use config::{ConfigError, SecurityCamConfig};
pub use pipeline::{DetectionPipeline, PipelineOutcome, UploadOutcome};

pub use radarcam_driver as driver;
pub use radarcam_protocol as protocol;
pub use radarcam_recorder as recorder;
pub use radarcam_serial as serial;
pub use radarcam_upload as upload;

//! `SecurityCam` 生命周期
//!
//! 关闭顺序：停止监视器 → 等待监视线程退出 → 关闭摄像头 → 断开上传连接。

use crate::config::{ConfigError, SecurityCamConfig};
use crate::pipeline::DetectionPipeline;
use radarcam_driver::{DetectionEvent, DriverError, MetricsSnapshot, SensorMonitor};
use radarcam_recorder::{CaptureBackend, Recorder};
use radarcam_serial::{SerialError, SerialSource};
use radarcam_upload::{UploadTransport, Uploader};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// 顶层错误
#[derive(Error, Debug)]
pub enum SecurityCamError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 没有提供该组件，且当前构建未启用对应的硬件后端
    #[error("No {0} configured and the hardware backend is disabled")]
    MissingComponent(&'static str),
}

/// `SecurityCam` 构造器
///
/// 未显式提供的组件按配置创建真实硬件后端（需要 `hardware` feature）。
///
/// # Example
///
/// ```no_run
/// use radarcam_sdk::{SecurityCamBuilder, SecurityCamConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SecurityCamConfig::load(None)?;
/// let mut cam = SecurityCamBuilder::new(config).build()?;
/// cam.start()?;
/// // ...
/// cam.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct SecurityCamBuilder {
    config: SecurityCamConfig,
    source: Option<Box<dyn SerialSource>>,
    camera: Option<Box<dyn CaptureBackend>>,
    transport: Option<Box<dyn UploadTransport>>,
}

impl SecurityCamBuilder {
    pub fn new(config: SecurityCamConfig) -> Self {
        Self {
            config,
            source: None,
            camera: None,
            transport: None,
        }
    }

    /// 使用指定的串口字节源
    pub fn source(mut self, source: impl SerialSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// 使用指定的采集后端
    pub fn camera(mut self, camera: impl CaptureBackend + 'static) -> Self {
        self.camera = Some(Box::new(camera));
        self
    }

    /// 使用指定的上传后端
    pub fn transport(mut self, transport: impl UploadTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn build(self) -> Result<SecurityCam, SecurityCamError> {
        let config = self.config;

        let source = match self.source {
            Some(source) => source,
            None => open_serial(&config)?,
        };
        let camera = match self.camera {
            Some(camera) => camera,
            None => default_camera(&config)?,
        };

        let recorder = Arc::new(Recorder::new(
            camera,
            config.camera_config(),
            config.recording.path.clone(),
        ));

        let uploader = match config.ftp_config() {
            Some(ftp) => {
                let transport = match self.transport {
                    Some(transport) => transport,
                    None => default_transport()?,
                };
                Some(Arc::new(Uploader::new(transport, ftp)))
            },
            None => None,
        };

        let pipeline = Arc::new(
            DetectionPipeline::new(recorder.clone(), uploader.clone(), config.recording_duration())
                .with_cooldown(config.cooldown()),
        );

        Ok(SecurityCam {
            monitor: SensorMonitor::new(source, config.monitor_config()),
            pipeline,
            recorder,
            uploader,
            shut_down: false,
        })
    }
}

#[cfg(feature = "hardware")]
fn open_serial(config: &SecurityCamConfig) -> Result<Box<dyn SerialSource>, SecurityCamError> {
    let serial = config.serial_config();
    info!("Opening UART device: {}", serial.path);
    info!("Baud rate: {}", serial.baud_rate);
    Ok(Box::new(radarcam_serial::SerialPortSource::open(&serial)?))
}

#[cfg(not(feature = "hardware"))]
fn open_serial(_config: &SecurityCamConfig) -> Result<Box<dyn SerialSource>, SecurityCamError> {
    Err(SecurityCamError::MissingComponent("serial source"))
}

#[cfg(feature = "hardware")]
fn default_camera(config: &SecurityCamConfig) -> Result<Box<dyn CaptureBackend>, SecurityCamError> {
    Ok(Box::new(radarcam_recorder::RpicamBackend::new(
        config.camera.program.clone(),
    )))
}

#[cfg(not(feature = "hardware"))]
fn default_camera(_config: &SecurityCamConfig) -> Result<Box<dyn CaptureBackend>, SecurityCamError> {
    Err(SecurityCamError::MissingComponent("capture backend"))
}

#[cfg(feature = "hardware")]
fn default_transport() -> Result<Box<dyn UploadTransport>, SecurityCamError> {
    Ok(Box::new(radarcam_upload::FtpTransport::new()))
}

#[cfg(not(feature = "hardware"))]
fn default_transport() -> Result<Box<dyn UploadTransport>, SecurityCamError> {
    Err(SecurityCamError::MissingComponent("upload transport"))
}

/// 雷达触发的安防摄像头
pub struct SecurityCam {
    monitor: SensorMonitor<Box<dyn SerialSource>>,
    pipeline: Arc<DetectionPipeline>,
    recorder: Arc<Recorder>,
    uploader: Option<Arc<Uploader>>,
    shut_down: bool,
}

impl SecurityCam {
    /// 开始监视；立即返回
    pub fn start(&mut self) -> Result<(), SecurityCamError> {
        self.monitor.start(self.pipeline.handler())?;
        info!("Monitoring for motion... Press Ctrl+C to stop");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.monitor.is_running()
    }

    pub fn pipeline(&self) -> &Arc<DetectionPipeline> {
        &self.pipeline
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    pub fn uploader(&self) -> Option<&Arc<Uploader>> {
        self.uploader.as_ref()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.monitor.metrics()
    }

    pub fn last_event(&self) -> Option<Arc<DetectionEvent>> {
        self.monitor.last_event()
    }

    /// 按顺序释放所有资源；幂等
    ///
    /// 正在进行的录制不会被打断，本方法会等待其结束。
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        info!("Stopping...");
        self.monitor.close();
        self.recorder.cleanup();
        if let Some(uploader) = &self.uploader {
            uploader.close();
        }
        info!("Shutdown complete");
    }
}

impl Drop for SecurityCam {
    fn drop(&mut self) {
        self.shutdown();
    }
}

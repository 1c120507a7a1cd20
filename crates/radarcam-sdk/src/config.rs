//! 配置
//!
//! 加载顺序：内置默认值 → 可选 TOML 文件 → 环境变量覆盖 → `validate()`。
//!
//! ```toml
//! [sensor]
//! device = "/dev/ttyS0"
//! framing = { kind = "sentinel", motion_threshold = 140 }
//!
//! [camera]
//! width = 1280
//! height = 720
//! zoom = [0.25, 0.25, 0.5, 0.5]
//!
//! [recording]
//! duration_secs = 20
//! path = "/var/lib/radarcam"
//!
//! [ftp]
//! enabled = false
//! ```

use radarcam_driver::{DispatchMode, MonitorConfig};
use radarcam_protocol::FrameStrategy;
use radarcam_recorder::{CameraConfig, Rotation, Zoom};
use radarcam_serial::SerialConfig;
use radarcam_upload::FtpConfig;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Bounded 帧格式的默认波特率
pub const BOUNDED_BAUD_RATE: u32 = 256_000;

/// Sentinel 帧格式的默认波特率
pub const SENTINEL_BAUD_RATE: u32 = 115_200;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: impl Display, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// 传感器（串口 + 监视器）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub device: String,
    /// 未设置时按帧格式取默认值
    pub baud_rate: Option<u32>,
    pub framing: FrameStrategy,
    pub poll_interval_ms: u64,
    pub min_event_interval_ms: u64,
    /// 设置后使用 Queued 派发
    pub queue_capacity: Option<usize>,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            device: "/dev/ttyS0".to_string(),
            baud_rate: None,
            framing: FrameStrategy::Bounded,
            poll_interval_ms: 50,
            min_event_interval_ms: 500,
            queue_capacity: None,
        }
    }
}

impl SensorSettings {
    pub fn effective_baud_rate(&self) -> u32 {
        self.baud_rate.unwrap_or(match self.framing {
            FrameStrategy::Bounded => BOUNDED_BAUD_RATE,
            FrameStrategy::Sentinel { .. } => SENTINEL_BAUD_RATE,
        })
    }
}

/// 摄像头
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// 归一化 `(x, y, w, h)`
    pub zoom: [f64; 4],
    pub rotation: u16,
    pub hflip: bool,
    pub vflip: bool,
    pub bitrate: u32,
    /// 采集程序
    pub program: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        let camera = CameraConfig::default();
        Self {
            width: camera.width,
            height: camera.height,
            fps: camera.fps,
            zoom: [0.0, 0.0, 1.0, 1.0],
            rotation: 0,
            hflip: false,
            vflip: false,
            bitrate: camera.bitrate,
            program: "rpicam-vid".to_string(),
        }
    }
}

/// 录制
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub duration_secs: u64,
    pub path: PathBuf,
    /// 两次成功录制之间的冷却时间
    pub cooldown_secs: u64,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            duration_secs: 30,
            path: PathBuf::from("/app/recordings"),
            cooldown_secs: 5,
        }
    }
}

/// FTP 上传
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FtpSettings {
    pub enabled: bool,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remote_path: String,
    pub connect_timeout_secs: u64,
}

impl Default for FtpSettings {
    fn default() -> Self {
        let ftp = FtpConfig::default();
        Self {
            enabled: true,
            hostname: ftp.host,
            port: ftp.port,
            username: ftp.username,
            password: ftp.password,
            remote_path: ftp.remote_dir,
            connect_timeout_secs: ftp.connect_timeout.as_secs(),
        }
    }
}

impl std::fmt::Debug for FtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpSettings")
            .field("enabled", &self.enabled)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("remote_path", &self.remote_path)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// 完整配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityCamConfig {
    pub sensor: SensorSettings,
    pub camera: CameraSettings,
    pub recording: RecordingSettings,
    pub ftp: FtpSettings,
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, value, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected a boolean")),
    }
}

/// 解析 `(x, y, w, h)`，也接受方括号或不带括号的写法
fn parse_zoom(key: &str, value: &str) -> Result<[f64; 4], ConfigError> {
    let inner = value
        .trim()
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']']);
    let parts = inner
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_value::<f64>(key, part))
        .collect::<Result<Vec<_>, _>>()?;

    <[f64; 4]>::try_from(parts)
        .map_err(|_| ConfigError::invalid(key, value, "expected four numbers (x, y, w, h)"))
}

impl SecurityCamConfig {
    /// 读取 TOML 文件（缺失的字段取默认值）
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// 完整加载流程：默认值 → 文件 → 进程环境变量 → 校验
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 用环境变量覆盖配置
    ///
    /// `lookup` 返回变量值；测试中可以传入任意映射。
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        // sensor
        if let Some(v) = get("SENSOR_DEVICE") {
            self.sensor.device = v.trim().to_string();
        }
        if let Some(v) = get("SENSOR_FRAMING") {
            let framing: FrameStrategy = parse_value("SENSOR_FRAMING", &v)?;
            // 保留已配置的阈值
            self.sensor.framing = match (framing, self.sensor.framing) {
                (FrameStrategy::Sentinel { .. }, FrameStrategy::Sentinel { motion_threshold }) => {
                    FrameStrategy::Sentinel { motion_threshold }
                },
                (framing, _) => framing,
            };
        }
        if let Some(v) = get("SENSOR_BAUD_RATE") {
            self.sensor.baud_rate = Some(parse_value("SENSOR_BAUD_RATE", &v)?);
        }
        if let Some(v) = get("SENSOR_MOTION_THRESHOLD") {
            let threshold: u8 = parse_value("SENSOR_MOTION_THRESHOLD", &v)?;
            if self.sensor.framing == FrameStrategy::Bounded {
                return Err(ConfigError::invalid(
                    "SENSOR_MOTION_THRESHOLD",
                    threshold,
                    "only applies to sentinel framing",
                ));
            }
            self.sensor.framing = self.sensor.framing.with_motion_threshold(threshold);
        }

        // recording
        if let Some(v) = get("VIDEO_DURATION") {
            self.recording.duration_secs = parse_value("VIDEO_DURATION", &v)?;
        }
        if let Some(v) = get("RECORDINGS_PATH") {
            self.recording.path = PathBuf::from(v.trim());
        }

        // camera
        if let Some(v) = get("CAMERA_WIDTH") {
            self.camera.width = parse_value("CAMERA_WIDTH", &v)?;
        }
        if let Some(v) = get("CAMERA_HEIGHT") {
            self.camera.height = parse_value("CAMERA_HEIGHT", &v)?;
        }
        if let Some(v) = get("CAMERA_FPS") {
            self.camera.fps = parse_value("CAMERA_FPS", &v)?;
        }
        if let Some(v) = get("CAMERA_ZOOM") {
            self.camera.zoom = parse_zoom("CAMERA_ZOOM", &v)?;
        }
        if let Some(v) = get("CAMERA_ROTATION") {
            self.camera.rotation = parse_value("CAMERA_ROTATION", &v)?;
        }
        if let Some(v) = get("CAMERA_HFLIP") {
            self.camera.hflip = parse_bool("CAMERA_HFLIP", &v)?;
        }
        if let Some(v) = get("CAMERA_VFLIP") {
            self.camera.vflip = parse_bool("CAMERA_VFLIP", &v)?;
        }

        // ftp
        if let Some(v) = get("FTP_ENABLED") {
            self.ftp.enabled = parse_bool("FTP_ENABLED", &v)?;
        }
        if let Some(v) = get("FTP_HOSTNAME") {
            self.ftp.hostname = v.trim().to_string();
        }
        if let Some(v) = get("FTP_PORT") {
            self.ftp.port = parse_value("FTP_PORT", &v)?;
        }
        if let Some(v) = get("FTP_USERNAME") {
            self.ftp.username = v;
        }
        if let Some(v) = get("FTP_PASSWORD") {
            self.ftp.password = v;
        }
        if let Some(v) = get("FTP_REMOTE_PATH") {
            self.ftp.remote_path = v.trim().to_string();
        }

        Ok(())
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.device.trim().is_empty() {
            return Err(ConfigError::invalid("sensor.device", "", "must not be empty"));
        }
        if self.sensor.baud_rate == Some(0) {
            return Err(ConfigError::invalid("sensor.baud_rate", 0, "must be positive"));
        }
        if self.sensor.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("sensor.poll_interval_ms", 0, "must be positive"));
        }
        if self.sensor.queue_capacity == Some(0) {
            return Err(ConfigError::invalid("sensor.queue_capacity", 0, "must be positive"));
        }
        if self.recording.duration_secs == 0 {
            return Err(ConfigError::invalid("VIDEO_DURATION", 0, "must be positive"));
        }
        for (key, value) in [
            ("CAMERA_WIDTH", self.camera.width),
            ("CAMERA_HEIGHT", self.camera.height),
            ("CAMERA_FPS", self.camera.fps),
            ("camera.bitrate", self.camera.bitrate),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(key, value, "must be positive"));
            }
        }
        if !self.zoom().is_valid() {
            return Err(ConfigError::invalid(
                "CAMERA_ZOOM",
                format!("{:?}", self.camera.zoom),
                "components must be within [0, 1] with non-zero width and height",
            ));
        }
        if Rotation::from_degrees(self.camera.rotation).is_none() {
            return Err(ConfigError::invalid(
                "CAMERA_ROTATION",
                self.camera.rotation,
                "only 0 and 180 are supported",
            ));
        }
        if self.ftp.enabled && self.ftp.hostname.trim().is_empty() {
            return Err(ConfigError::invalid(
                "FTP_HOSTNAME",
                "",
                "required when FTP is enabled",
            ));
        }
        Ok(())
    }

    fn zoom(&self) -> Zoom {
        let [x, y, w, h] = self.camera.zoom;
        Zoom::new(x, y, w, h)
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(self.sensor.device.clone(), self.sensor.effective_baud_rate())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let dispatch = match self.sensor.queue_capacity {
            Some(capacity) => DispatchMode::queued(capacity),
            None => DispatchMode::Inline,
        };
        MonitorConfig::default()
            .with_strategy(self.sensor.framing)
            .with_poll_interval(Duration::from_millis(self.sensor.poll_interval_ms))
            .with_min_event_interval(Duration::from_millis(self.sensor.min_event_interval_ms))
            .with_dispatch(dispatch)
    }

    /// 摄像头配置（旋转角度非法时回退为 0°，`validate()` 会先拒绝这种配置）
    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            width: self.camera.width,
            height: self.camera.height,
            fps: self.camera.fps,
            zoom: self.zoom(),
            rotation: Rotation::from_degrees(self.camera.rotation).unwrap_or_default(),
            hflip: self.camera.hflip,
            vflip: self.camera.vflip,
            bitrate: self.camera.bitrate,
        }
    }

    /// FTP 配置；未启用时返回 `None`
    pub fn ftp_config(&self) -> Option<FtpConfig> {
        self.ftp.enabled.then(|| FtpConfig {
            host: self.ftp.hostname.clone(),
            port: self.ftp.port,
            username: self.ftp.username.clone(),
            password: self.ftp.password.clone(),
            remote_dir: self.ftp.remote_path.clone(),
            connect_timeout: Duration::from_secs(self.ftp.connect_timeout_secs),
        })
    }

    pub fn recording_duration(&self) -> Duration {
        Duration::from_secs(self.recording.duration_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.recording.cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SecurityCamConfig::default();
        assert_eq!(config.recording.duration_secs, 30);
        assert_eq!(config.recording.path, PathBuf::from("/app/recordings"));
        assert_eq!(config.recording.cooldown_secs, 5);
        assert_eq!(config.camera.width, 1920);
        assert_eq!(config.camera.height, 1080);
        assert_eq!(config.camera.fps, 30);
        assert_eq!(config.camera.zoom, [0.0, 0.0, 1.0, 1.0]);
        assert!(config.ftp.enabled);
        assert_eq!(config.ftp.hostname, "127.0.0.1");
        assert_eq!(config.ftp.port, 21);
        assert_eq!(config.ftp.remote_path, "/");
        assert_eq!(config.sensor.effective_baud_rate(), 256_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SecurityCamConfig::default();
        config
            .apply_env(env(&[
                ("VIDEO_DURATION", "12"),
                ("RECORDINGS_PATH", "/tmp/rec"),
                ("CAMERA_ZOOM", "(0.25, 0.25, 0.5, 0.5)"),
                ("CAMERA_ROTATION", "180"),
                ("CAMERA_HFLIP", "True"),
                ("FTP_ENABLED", "False"),
                ("FTP_PORT", "2121"),
                ("SENSOR_FRAMING", "sentinel"),
                ("SENSOR_MOTION_THRESHOLD", "120"),
            ]))
            .unwrap();

        assert_eq!(config.recording_duration(), Duration::from_secs(12));
        assert_eq!(config.recording.path, PathBuf::from("/tmp/rec"));
        assert_eq!(config.camera.zoom, [0.25, 0.25, 0.5, 0.5]);
        assert_eq!(config.camera_config().rotation, Rotation::Half);
        assert!(config.camera.hflip);
        assert!(!config.camera.vflip);
        assert!(config.ftp_config().is_none());
        assert_eq!(config.ftp.port, 2121);
        assert_eq!(
            config.sensor.framing,
            FrameStrategy::Sentinel {
                motion_threshold: 120
            }
        );
        assert_eq!(config.serial_config().baud_rate, 115_200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_env_value() {
        let mut config = SecurityCamConfig::default();
        let err = config
            .apply_env(env(&[("CAMERA_FPS", "thirty")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "CAMERA_FPS");
                assert_eq!(value, "thirty");
            },
            other => panic!("unexpected error: {other}"),
        }

        let err = config
            .apply_env(env(&[("CAMERA_ZOOM", "(0.1, 0.2)")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = config
            .apply_env(env(&[("FTP_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_motion_threshold_rejected_for_bounded_framing() {
        let mut config = SecurityCamConfig::default();
        let err = config
            .apply_env(env(&[("SENSOR_MOTION_THRESHOLD", "120")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "SENSOR_MOTION_THRESHOLD");
                assert_eq!(value, "120");
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(config.sensor.framing, FrameStrategy::Bounded);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = SecurityCamConfig::default();
        config.apply_env(env(&[("CAMERA_WIDTH", "  ")])).unwrap();
        assert_eq!(config.camera.width, 1920);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut SecurityCamConfig)>)> = vec![
            ("VIDEO_DURATION", Box::new(|c| c.recording.duration_secs = 0)),
            ("sensor.poll_interval_ms", Box::new(|c| c.sensor.poll_interval_ms = 0)),
            ("CAMERA_WIDTH", Box::new(|c| c.camera.width = 0)),
            ("CAMERA_FPS", Box::new(|c| c.camera.fps = 0)),
            ("CAMERA_ZOOM", Box::new(|c| c.camera.zoom = [0.0, 0.0, 1.2, 1.0])),
            ("CAMERA_ROTATION", Box::new(|c| c.camera.rotation = 90)),
            ("FTP_HOSTNAME", Box::new(|c| c.ftp.hostname.clear())),
        ];

        for (expected_key, mutate) in cases {
            let mut config = SecurityCamConfig::default();
            mutate(&mut config);
            match config.validate() {
                Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("{expected_key}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_host_allowed_when_ftp_disabled() {
        let mut config = SecurityCamConfig::default();
        config.ftp.enabled = false;
        config.ftp.hostname.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_file() {
        let config = SecurityCamConfig::from_toml_str(
            r#"
            [sensor]
            device = "/dev/ttyAMA0"
            framing = { kind = "sentinel", motion_threshold = 150 }
            queue_capacity = 4

            [camera]
            zoom = [0.1, 0.1, 0.8, 0.8]
            vflip = true

            [ftp]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.sensor.device, "/dev/ttyAMA0");
        assert_eq!(
            config.monitor_config().strategy,
            FrameStrategy::Sentinel {
                motion_threshold: 150
            }
        );
        assert_eq!(
            config.monitor_config().dispatch,
            DispatchMode::Queued { capacity: 4 }
        );
        assert!(config.camera.vflip);
        assert_eq!(config.camera.width, 1920);
        assert_eq!(config.recording.duration_secs, 30);
        assert!(config.ftp_config().is_none());
    }

    #[test]
    fn test_toml_syntax_error() {
        let err = SecurityCamConfig::from_toml_str("[camera\nwidth = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

//! # radarcam Serial Layer
//!
//! 串口字节源抽象层。上层（监视器）只依赖两个能力：
//! "非阻塞探测可读字节数" 和 "读取当前可读的字节"。
//!
//! ## 后端
//!
//! - `serialport`（默认）：基于 `serialport` crate 的真实 UART，8N1
//! - `mock`：内存队列，供测试注入字节批次和 IO 错误

use std::io;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "serialport")]
pub mod port;

#[cfg(feature = "serialport")]
pub use port::SerialPortSource;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockSerialHandle, MockSerialSource};

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },
    #[error("Device disconnected: {0}")]
    Disconnected(String),
    #[error("Serial source already released")]
    Released,
}

impl SerialError {
    /// 是否为设备层面的致命错误（需要重新打开才能恢复）
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Released)
    }
}

/// 串口参数
///
/// 固定 8 数据位 / 无校验 / 1 停止位，只有设备路径、波特率和读超时可配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// 设备路径（如 `/dev/ttyS0`）
    pub path: String,
    /// 波特率
    pub baud_rate: u32,
    /// 读超时
    pub timeout: Duration,
}

impl SerialConfig {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            ..Self::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyS0".to_string(),
            baud_rate: 256_000,
            timeout: Duration::from_secs(1),
        }
    }
}

/// 串口字节源
///
/// 监视器线程独占持有，因此只要求 `Send`。
pub trait SerialSource: Send {
    /// 非阻塞探测当前可读字节数
    fn bytes_available(&mut self) -> Result<usize, SerialError>;

    /// 读取字节到 `buf`，返回实际读取的字节数
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;

    /// 读取当前所有可读字节，追加到 `out`
    ///
    /// 先探测可读字节数，再一次性读取；没有数据时返回 `Ok(0)` 且不阻塞。
    fn read_available(&mut self, out: &mut Vec<u8>) -> Result<usize, SerialError> {
        let available = self.bytes_available()?;
        if available == 0 {
            return Ok(0);
        }

        let start = out.len();
        out.resize(start + available, 0);
        match self.read(&mut out[start..]) {
            Ok(n) => {
                out.truncate(start + n);
                Ok(n)
            },
            Err(e) => {
                out.truncate(start);
                Err(e)
            },
        }
    }

    /// 释放底层设备
    ///
    /// 监视器拆除时调用；辅助存在检测引脚（GPIO）之类的资源也应在这里复位。
    fn release(&mut self) {}
}

impl<S: SerialSource + ?Sized> SerialSource for Box<S> {
    fn bytes_available(&mut self) -> Result<usize, SerialError> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        (**self).read(buf)
    }

    fn read_available(&mut self, out: &mut Vec<u8>) -> Result<usize, SerialError> {
        (**self).read_available(out)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.path, "/dev/ttyS0");
        assert_eq!(config.baud_rate, 256_000);
        assert_eq!(config.timeout, Duration::from_secs(1));

        let config = SerialConfig::new("/dev/ttyAMA0", 115_200);
        assert_eq!(config.path, "/dev/ttyAMA0");
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_serial_error_display() {
        let err = SerialError::Open {
            path: "/dev/ttyS9".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open /dev/ttyS9: No such file or directory"
        );
        assert!(!err.is_fatal());
        assert!(SerialError::Disconnected("usb unplugged".into()).is_fatal());
    }

    #[test]
    fn test_read_available_truncates_short_read() {
        struct ShortRead;
        impl SerialSource for ShortRead {
            fn bytes_available(&mut self) -> Result<usize, SerialError> {
                Ok(8)
            }
            fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
                buf[..3].copy_from_slice(&[1, 2, 3]);
                Ok(3)
            }
        }

        let mut out = vec![0xAA];
        let n = ShortRead.read_available(&mut out).unwrap();
        assert_eq!(n, 3);
        assert_eq!(out, vec![0xAA, 1, 2, 3]);
    }
}

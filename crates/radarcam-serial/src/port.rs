//! 基于 `serialport` crate 的真实 UART 后端

use crate::{SerialConfig, SerialError, SerialSource};
use serialport::{DataBits, ErrorKind, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read};
use tracing::{debug, info, warn};

/// 真实串口字节源
///
/// `release()` 之后底层句柄被丢弃，后续所有操作返回 [`SerialError::Released`]。
pub struct SerialPortSource {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl SerialPortSource {
    /// 以 8N1 打开串口
    pub fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        let port = serialport::new(&config.path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|e| SerialError::Open {
                path: config.path.clone(),
                message: e.to_string(),
            })?;

        info!(
            "Opened serial port {} at {} baud",
            config.path, config.baud_rate
        );

        Ok(Self {
            port: Some(port),
            path: config.path.clone(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, SerialError> {
        self.port.as_mut().ok_or(SerialError::Released)
    }
}

fn map_port_error(path: &str, err: serialport::Error) -> SerialError {
    match err.kind() {
        ErrorKind::NoDevice => SerialError::Disconnected(format!("{}: {}", path, err)),
        ErrorKind::Io(kind) => SerialError::Io(io::Error::new(kind, err.description)),
        _ => SerialError::Io(io::Error::other(err.to_string())),
    }
}

impl SerialSource for SerialPortSource {
    fn bytes_available(&mut self) -> Result<usize, SerialError> {
        let path = self.path.clone();
        let port = self.port_mut()?;
        port.bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| map_port_error(&path, e))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            // 探测到有数据但读超时：视为本轮没有数据
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(SerialError::Io(e)),
        }
    }

    fn release(&mut self) {
        if let Some(port) = self.port.take() {
            if let Err(e) = port.clear(serialport::ClearBuffer::All) {
                warn!("Failed to clear serial buffers on {}: {}", self.path, e);
            }
            drop(port);
            debug!("Serial port {} released", self.path);
        }
    }
}

impl Drop for SerialPortSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_fails() {
        let config = SerialConfig::new("/dev/radarcam-does-not-exist", 256_000);
        match SerialPortSource::open(&config) {
            Err(SerialError::Open { path, .. }) => {
                assert_eq!(path, "/dev/radarcam-does-not-exist");
            },
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opening a missing device should fail"),
        }
    }

    #[test]
    fn test_map_no_device_is_fatal() {
        let err = serialport::Error::new(ErrorKind::NoDevice, "gone");
        assert!(map_port_error("/dev/ttyS0", err).is_fatal());

        let err = serialport::Error::new(ErrorKind::Io(io::ErrorKind::BrokenPipe), "pipe");
        match map_port_error("/dev/ttyS0", err) {
            SerialError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected error: {other}"),
        }
    }
}

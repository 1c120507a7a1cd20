//! 基于 `suppaftp` 的 FTP 后端

use crate::config::FtpConfig;
use crate::error::TransportError;
use crate::transport::{UploadConnection, UploadTransport};
use std::io::Read;
use std::net::ToSocketAddrs;
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use tracing::{debug, info};

/// FTP 传输后端（明文，二进制传输模式）
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpTransport;

impl FtpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl UploadTransport for FtpTransport {
    fn connect(&mut self, config: &FtpConfig) -> Result<Box<dyn UploadConnection>, TransportError> {
        let address = config.address();
        let connect_error = |message: String| TransportError::Connect {
            address: address.clone(),
            message,
        };

        let socket_addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| connect_error(e.to_string()))?
            .next()
            .ok_or_else(|| connect_error("host did not resolve".to_string()))?;

        let mut stream = FtpStream::connect_timeout(socket_addr, config.connect_timeout)
            .map_err(|e| connect_error(e.to_string()))?;
        stream
            .login(&config.username, &config.password)
            .map_err(|e| TransportError::Login(e.to_string()))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| TransportError::Transfer(e.to_string()))?;

        info!("Connected to FTP server {} as {}", address, config.username);
        Ok(Box::new(FtpConnection {
            stream: Some(stream),
        }))
    }
}

struct FtpConnection {
    stream: Option<FtpStream>,
}

impl FtpConnection {
    fn stream(&mut self) -> Result<&mut FtpStream, TransportError> {
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::Transfer("connection already closed".to_string()))
    }
}

impl UploadConnection for FtpConnection {
    fn store(&mut self, remote_path: &str, mut reader: &mut dyn Read) -> Result<u64, TransportError> {
        let stream = self.stream()?;
        stream
            .put_file(remote_path, &mut reader)
            .map_err(|e| TransportError::Transfer(e.to_string()))
    }

    fn quit(&mut self) -> Result<(), TransportError> {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| TransportError::Transfer("connection already closed".to_string()))?;
        let result = stream
            .quit()
            .map_err(|e| TransportError::Transfer(e.to_string()));
        // quit 失败时保留句柄，交给 close() 强制关闭
        if result.is_err() {
            self.stream = Some(stream);
        }
        result
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("FTP connection dropped");
        }
    }
}

//! 上传协调器

use crate::config::FtpConfig;
use crate::error::UploadError;
use crate::transport::{UploadConnection, UploadTransport};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, error, info, warn};

struct Inner {
    transport: Box<dyn UploadTransport>,
    connection: Option<Box<dyn UploadConnection>>,
}

impl Inner {
    /// 丢弃当前连接（强制关闭）
    fn drop_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}

/// 上传协调器
pub struct Uploader {
    inner: Mutex<Inner>,
    config: FtpConfig,
}

impl Uploader {
    pub fn new(transport: impl UploadTransport + 'static, config: FtpConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                transport: Box::new(transport),
                connection: None,
            }),
            config,
        }
    }

    pub fn config(&self) -> &FtpConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connection.is_some()
    }

    /// 上传本地文件，成功后删除它
    ///
    /// 失败时本地文件保持原样。
    pub fn upload(&self, local_path: &Path) -> Result<(), UploadError> {
        let mut inner = self.inner.lock();

        if !local_path.is_file() {
            info!("Error: Local file {} not found", local_path.display());
            return Err(UploadError::FileNotFound(local_path.to_path_buf()));
        }
        let Some(file_name) = local_path.file_name().and_then(|name| name.to_str()) else {
            return Err(UploadError::FileNotFound(local_path.to_path_buf()));
        };

        let file = File::open(local_path).map_err(|e| {
            let err = UploadError::local(local_path, e);
            error!("{}", err);
            err
        })?;

        let Inner {
            transport,
            connection,
        } = &mut *inner;
        let connection = match connection {
            Some(connection) => connection,
            empty => {
                debug!("Connecting to FTP server {}", self.config.address());
                match transport.connect(&self.config) {
                    Ok(connection) => empty.insert(connection),
                    Err(e) => {
                        error!("FTP connection error: {}", e);
                        return Err(UploadError::ConnectionFailed(e));
                    },
                }
            },
        };

        let remote_path = self.config.remote_path(file_name);
        let mut reader = BufReader::new(file);
        match connection.store(&remote_path, &mut reader) {
            Ok(bytes) => {
                info!(
                    "Successfully uploaded {} to remote server ({} bytes)",
                    local_path.display(),
                    bytes
                );
            },
            Err(e) => {
                error!("FTP upload error: {}", e);
                inner.drop_connection();
                return Err(UploadError::ConnectionFailed(e));
            },
        }

        match fs::remove_file(local_path) {
            Ok(()) => info!("Removed local file {}", local_path.display()),
            Err(e) => warn!("Failed to remove local file {}: {}", local_path.display(), e),
        }
        Ok(())
    }

    /// 断开连接：先尝试 `quit`，失败则强制关闭；句柄总会被清空
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(mut connection) = inner.connection.take() {
            match connection.quit() {
                Ok(()) => info!("FTP connection closed"),
                Err(e) => {
                    warn!("FTP quit failed ({}), forcing close", e);
                    connection.close();
                },
            }
        }
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        self.close();
    }
}

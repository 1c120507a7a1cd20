//! 上传层错误类型定义

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 传输后端错误
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {address}: {message}")]
    Connect { address: String, message: String },

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

/// 上传协调器错误
#[derive(Error, Debug)]
pub enum UploadError {
    /// 本地文件不存在（没有触碰连接）
    #[error("Local file {} not found", .0.display())]
    FileNotFound(PathBuf),

    /// 本地文件存在但无法读取（没有触碰连接）
    #[error("Failed to open local file {}: {source}", .path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 连接或传输失败；连接句柄已丢弃，本地文件保留
    #[error("Upload connection failed: {0}")]
    ConnectionFailed(#[from] TransportError),
}

impl UploadError {
    /// 打开本地文件失败时的错误
    pub(crate) fn local(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::FileNotFound(path.to_path_buf())
        } else {
            Self::LocalFile {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// 是否为远端（连接/传输）问题
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_display() {
        let err = UploadError::FileNotFound(PathBuf::from("/tmp/motion_x.mp4"));
        assert_eq!(err.to_string(), "Local file /tmp/motion_x.mp4 not found");

        let err: UploadError = TransportError::Login("530 Login incorrect".into()).into();
        assert_eq!(
            err.to_string(),
            "Upload connection failed: Login failed: 530 Login incorrect"
        );
    }

    #[test]
    fn test_local_open_errors_are_not_remote() {
        let path = Path::new("/recordings/motion_x.mp4");

        let err = UploadError::local(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, UploadError::FileNotFound(ref p) if p == path));
        assert!(!err.is_remote());

        let err = UploadError::local(path, io::Error::from(io::ErrorKind::PermissionDenied));
        match &err {
            UploadError::LocalFile { path: p, source } => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_remote());
        assert!(err.to_string().starts_with("Failed to open local file /recordings/motion_x.mp4"));

        let err: UploadError = TransportError::Transfer("451".into()).into();
        assert!(err.is_remote());
    }
}

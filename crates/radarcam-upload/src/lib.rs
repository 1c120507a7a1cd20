//! # radarcam Upload
//!
//! 上传协调层：把录像文件传到远端，成功后删除本地文件，失败时保留。
//!
//! - 所有上传由一把互斥锁串行化
//! - 连接懒建立并在多次上传间复用；任何连接/传输错误都会丢弃连接句柄，
//!   下一次上传重新连接（不做重试循环）

pub mod config;
pub mod error;
pub mod transport;
pub mod uploader;

#[cfg(feature = "ftp")]
pub mod ftp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::FtpConfig;
pub use error::{TransportError, UploadError};
pub use transport::{UploadConnection, UploadTransport};
pub use uploader::Uploader;

#[cfg(feature = "ftp")]
pub use ftp::FtpTransport;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockTransport, MockTransportHandle};

//! 传输后端抽象

use crate::config::FtpConfig;
use crate::error::TransportError;
use std::io::Read;

/// 传输后端：建立到远端的连接
pub trait UploadTransport: Send {
    fn connect(&mut self, config: &FtpConfig) -> Result<Box<dyn UploadConnection>, TransportError>;
}

/// 已登录的远端连接
pub trait UploadConnection: Send {
    /// 把 `reader` 的全部内容写到远端 `remote_path`，返回字节数
    fn store(&mut self, remote_path: &str, reader: &mut dyn Read) -> Result<u64, TransportError>;

    /// 正常断开
    fn quit(&mut self) -> Result<(), TransportError>;

    /// 强制关闭底层连接
    fn close(&mut self);
}

impl UploadTransport for Box<dyn UploadTransport> {
    fn connect(&mut self, config: &FtpConfig) -> Result<Box<dyn UploadConnection>, TransportError> {
        (**self).connect(config)
    }
}

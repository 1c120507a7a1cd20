//! 远端服务器配置

use std::fmt;
use std::time::Duration;

/// FTP 服务器配置
#[derive(Clone, PartialEq, Eq)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// 远端目录
    pub remote_dir: String,
    /// 建立连接的超时
    pub connect_timeout: Duration,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21,
            username: "username".to_string(),
            password: "password".to_string(),
            remote_dir: "/".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// 密码不进日志
impl fmt::Debug for FtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("remote_dir", &self.remote_dir)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl FtpConfig {
    /// 远端文件路径：`<remote_dir>/<file_name>`
    pub fn remote_path(&self, file_name: &str) -> String {
        if self.remote_dir.is_empty() {
            file_name.to_string()
        } else if self.remote_dir.ends_with('/') {
            format!("{}{}", self.remote_dir, file_name)
        } else {
            format!("{}/{}", self.remote_dir, file_name)
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

//! 驱动层错误类型定义

use radarcam_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 监视线程已在运行
    #[error("Sensor monitor is already running")]
    AlreadyRunning,

    /// 串口字节源不可用（已关闭，或监视线程异常退出后丢失）
    #[error("Serial source is not available (monitor closed or thread panicked)")]
    SourceUnavailable,

    /// 串口错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 线程创建失败
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

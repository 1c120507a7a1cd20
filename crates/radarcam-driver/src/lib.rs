//! # radarcam Driver
//!
//! 传感器监视层：后台线程轮询串口、解析帧、去抖，并把检测事件交给回调。
//!
//! ## 线程模型
//!
//! - `DispatchMode::Inline`（默认）：回调在监视线程上同步执行，
//!   回调阻塞期间串口字节在 OS 缓冲区中堆积
//! - `DispatchMode::Queued`：监视线程把事件放入有界队列，由单个 worker 线程消费，
//!   队列满时丢弃事件并计数
//!
//! 设备断开等致命读错误不会结束监视线程，而是按指数退避重试。

pub mod config;
pub mod debounce;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod monitor;

pub use config::{DispatchMode, MonitorConfig};
pub use debounce::Debouncer;
pub use error::DriverError;
pub use handler::{DetectionHandler, HandlerError};
pub use metrics::{MetricsSnapshot, MonitorMetrics};
pub use monitor::{MAX_ERROR_BACKOFF, SensorMonitor};

pub use radarcam_protocol::{DetectionEvent, FrameStrategy};
pub use radarcam_serial::{SerialError, SerialSource};

//! 检测回调
//!
//! 回调在监视线程（Inline）或 worker 线程（Queued）上执行。
//! 返回 `Err` 或 panic 都只会被记录和计数，不会终止轮询。

use crate::metrics::MonitorMetrics;
use radarcam_protocol::DetectionEvent;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// 回调错误类型
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// 检测事件回调
///
/// 任何 `FnMut(&DetectionEvent) -> Result<(), HandlerError> + Send` 闭包都自动实现该 trait。
pub trait DetectionHandler: Send {
    fn on_detection(&mut self, event: &DetectionEvent) -> Result<(), HandlerError>;
}

impl<F> DetectionHandler for F
where
    F: FnMut(&DetectionEvent) -> Result<(), HandlerError> + Send,
{
    fn on_detection(&mut self, event: &DetectionEvent) -> Result<(), HandlerError> {
        self(event)
    }
}

/// 执行回调，吞掉错误和 panic
pub(crate) fn invoke<H: DetectionHandler + ?Sized>(
    handler: &mut H,
    event: &DetectionEvent,
    metrics: &MonitorMetrics,
) {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.on_detection(event))) {
        Ok(Ok(())) => {},
        Ok(Err(e)) => {
            MonitorMetrics::add(&metrics.handler_errors, 1);
            error!("Error in detection callback: {}", e);
        },
        Err(payload) => {
            MonitorMetrics::add(&metrics.handler_panics, 1);
            error!("Detection callback panicked: {}", panic_message(payload.as_ref()));
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

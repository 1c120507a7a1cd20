//! 传感器监视器
//!
//! 一个后台线程循环执行：探测可读字节 → 读取 → 解析 → 取最后一帧 → 去抖 → 派发。
//! 串口字节源由监视线程独占，`stop()` 时随 `JoinHandle` 交还，因此监视器可以重复启动。

use crate::config::{DispatchMode, MonitorConfig};
use crate::debounce::Debouncer;
use crate::error::DriverError;
use crate::handler::{self, DetectionHandler};
use crate::metrics::{MetricsSnapshot, MonitorMetrics};
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, TrySendError, bounded};
use radarcam_protocol::{DetectionEvent, FrameParser};
use radarcam_serial::SerialSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 单次读取的初始缓冲区容量
const READ_BUFFER_CAPACITY: usize = 256;

/// 设备断开后重试间隔的上限
pub const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// 传感器监视器
///
/// # 示例
///
/// ```rust,no_run
/// use radarcam_driver::{DetectionEvent, HandlerError, MonitorConfig, SensorMonitor};
/// use radarcam_serial::{SerialConfig, SerialPortSource};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = SerialPortSource::open(&SerialConfig::default())?;
/// let mut monitor = SensorMonitor::new(source, MonitorConfig::default());
/// monitor.start(|event: &DetectionEvent| -> Result<(), HandlerError> {
///     println!("target at {} cm", event.distance_cm);
///     Ok(())
/// })?;
/// // ...
/// monitor.close();
/// # Ok(())
/// # }
/// ```
pub struct SensorMonitor<S: SerialSource + 'static> {
    /// 空闲时由监视器持有；运行时移交给监视线程
    source: Option<S>,
    config: MonitorConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<MonitorMetrics>,
    last_event: Arc<ArcSwapOption<DetectionEvent>>,
    poll_thread: Option<JoinHandle<S>>,
    worker_thread: Option<JoinHandle<()>>,
}

impl<S: SerialSource + 'static> SensorMonitor<S> {
    pub fn new(source: S, config: MonitorConfig) -> Self {
        Self {
            source: Some(source),
            config,
            is_running: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(MonitorMetrics::new()),
            last_event: Arc::new(ArcSwapOption::empty()),
            poll_thread: None,
            worker_thread: None,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// 启动监视线程
    ///
    /// 立即返回；已在运行时返回 [`DriverError::AlreadyRunning`]。
    pub fn start<H>(&mut self, handler: H) -> Result<(), DriverError>
    where
        H: DetectionHandler + 'static,
    {
        if self.poll_thread.is_some() {
            return Err(DriverError::AlreadyRunning);
        }
        let source = self.source.take().ok_or(DriverError::SourceUnavailable)?;

        self.is_running.store(true, Ordering::Release);

        let ctx = PollContext {
            config: self.config,
            is_running: self.is_running.clone(),
            metrics: self.metrics.clone(),
            last_event: self.last_event.clone(),
        };

        let spawned = match self.config.dispatch {
            DispatchMode::Inline => {
                let metrics = self.metrics.clone();
                let mut handler = handler;
                spawn_poll_thread(source, ctx, move |event| {
                    handler::invoke(&mut handler, &event, &metrics);
                })
            },
            DispatchMode::Queued { capacity } => {
                let (tx, rx) = bounded::<DetectionEvent>(capacity.max(1));
                let worker = thread::Builder::new()
                    .name("radarcam-dispatch".into())
                    .spawn({
                        let is_running = self.is_running.clone();
                        let metrics = self.metrics.clone();
                        move || dispatch_loop(rx, handler, is_running, metrics)
                    });
                match worker {
                    Ok(worker) => self.worker_thread = Some(worker),
                    Err(e) => {
                        self.is_running.store(false, Ordering::Release);
                        self.source = Some(source);
                        return Err(DriverError::ThreadSpawn(e));
                    },
                }

                let metrics = self.metrics.clone();
                spawn_poll_thread(source, ctx, move |event| match tx.try_send(event) {
                    Ok(()) => {},
                    Err(TrySendError::Full(_)) => {
                        MonitorMetrics::add(&metrics.events_dropped, 1);
                        warn!("Dispatch queue full, dropping detection event");
                    },
                    Err(TrySendError::Disconnected(_)) => {
                        MonitorMetrics::add(&metrics.events_dropped, 1);
                        warn!("Dispatch worker gone, dropping detection event");
                    },
                })
            },
        };

        match spawned {
            Ok(handle) => {
                self.poll_thread = Some(handle);
                info!(
                    "Sensor monitoring started ({} framing, {:?} dispatch)",
                    self.config.strategy, self.config.dispatch
                );
                Ok(())
            },
            Err(e) => {
                // 闭包随 spawn 失败一起被丢弃，worker 会因通道断开而退出
                self.is_running.store(false, Ordering::Release);
                if let Some(worker) = self.worker_thread.take() {
                    let _ = worker.join();
                }
                error!("Failed to spawn sensor monitor thread: {}", e);
                Err(DriverError::ThreadSpawn(e))
            },
        }
    }

    /// 停止监视线程并等待其退出
    ///
    /// 幂等。返回后不会再有回调被调用；正在执行的回调不会被打断，而是等待其完成。
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        if let Some(handle) = self.poll_thread.take() {
            match handle.join() {
                Ok(source) => self.source = Some(source),
                Err(_) => error!("Sensor monitor thread panicked, serial source lost"),
            }
        }

        if let Some(handle) = self.worker_thread.take()
            && handle.join().is_err()
        {
            error!("Dispatch worker thread panicked");
        }
    }

    /// 停止并释放串口
    ///
    /// 之后再调用 `start()` 返回 [`DriverError::SourceUnavailable`]。
    pub fn close(&mut self) {
        self.stop();
        if let Some(mut source) = self.source.take() {
            source.release();
            info!("Sensor monitor closed");
        }
    }

    pub fn is_running(&self) -> bool {
        self.poll_thread.is_some() && self.is_running.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 最近一次转发的事件（无锁读取）
    pub fn last_event(&self) -> Option<Arc<DetectionEvent>> {
        self.last_event.load_full()
    }
}

impl<S: SerialSource + 'static> Drop for SensorMonitor<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// 监视线程共享的上下文
struct PollContext {
    config: MonitorConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<MonitorMetrics>,
    last_event: Arc<ArcSwapOption<DetectionEvent>>,
}

fn spawn_poll_thread<S, D>(source: S, ctx: PollContext, dispatch: D) -> std::io::Result<JoinHandle<S>>
where
    S: SerialSource + 'static,
    D: FnMut(DetectionEvent) + Send + 'static,
{
    thread::Builder::new()
        .name("radarcam-monitor".into())
        .spawn(move || poll_loop(source, ctx, dispatch))
}

/// 轮询循环
///
/// 只有 `is_running` 变为 false 才会退出；读错误和回调错误都不会终止循环。
/// 致命读错误（设备断开）按指数退避重试，直到设备恢复。
fn poll_loop<S, D>(mut source: S, ctx: PollContext, mut dispatch: D) -> S
where
    S: SerialSource,
    D: FnMut(DetectionEvent),
{
    let PollContext {
        config,
        is_running,
        metrics,
        last_event,
    } = ctx;

    let mut parser = FrameParser::new(config.strategy);
    let mut debouncer = Debouncer::new(config.min_event_interval);
    let mut buf = Vec::with_capacity(READ_BUFFER_CAPACITY);
    let mut consecutive_errors: u32 = 0;

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Monitor thread: is_running flag is false, exiting");
            break;
        }

        buf.clear();
        let n = match source.read_available(&mut buf) {
            Ok(0) => {
                thread::sleep(config.poll_interval);
                continue;
            },
            Ok(n) => {
                consecutive_errors = 0;
                n
            },
            Err(e) => {
                MonitorMetrics::add(&metrics.read_errors, 1);
                consecutive_errors = consecutive_errors.saturating_add(1);
                if consecutive_errors == 1 {
                    error!("Error reading sensor data: {}", e);
                } else {
                    trace!("Error reading sensor data ({} in a row): {}", consecutive_errors, e);
                }

                let delay = if e.is_fatal() {
                    let delay = error_backoff(config.poll_interval, consecutive_errors);
                    debug!("Sensor device unavailable, retrying in {:?}", delay);
                    delay
                } else {
                    config.poll_interval
                };
                sleep_while_running(&is_running, delay, config.poll_interval);
                continue;
            },
        };

        MonitorMetrics::add(&metrics.bytes_read, n as u64);
        trace!("Read {} bytes: {}", n, hex::encode(&buf));

        let frames = parser.feed(&buf);
        let Some(frame) = frames.last() else {
            continue;
        };
        MonitorMetrics::add(&metrics.frames_parsed, frames.len() as u64);
        MonitorMetrics::add(&metrics.frames_superseded, frames.len() as u64 - 1);

        let event = DetectionEvent::from(frame);
        if !event.has_target() {
            MonitorMetrics::add(&metrics.events_without_target, 1);
            continue;
        }

        if !debouncer.admit(event.timestamp) {
            MonitorMetrics::add(&metrics.events_debounced, 1);
            debug!("Detection event debounced");
            continue;
        }

        MonitorMetrics::add(&metrics.events_forwarded, 1);
        last_event.store(Some(Arc::new(event.clone())));
        dispatch(event);
    }

    source
}

/// 第 `attempt` 次连续致命错误后的等待时间：`base * 2^(attempt-1)`，不超过 [`MAX_ERROR_BACKOFF`]
fn error_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor).min(MAX_ERROR_BACKOFF.max(base))
}

/// 分片睡眠，`is_running` 变为 false 时提前返回
fn sleep_while_running(is_running: &AtomicBool, total: Duration, slice: Duration) {
    let deadline = Instant::now() + total;
    let slice = slice.max(Duration::from_millis(1));
    loop {
        let now = Instant::now();
        if now >= deadline || !is_running.load(Ordering::Acquire) {
            return;
        }
        thread::sleep(slice.min(deadline - now));
    }
}

/// Queued 模式的 worker 循环
///
/// 通道断开（监视线程退出）时结束；停止后队列中剩余的事件被丢弃。
fn dispatch_loop<H: DetectionHandler>(
    rx: Receiver<DetectionEvent>,
    mut handler: H,
    is_running: Arc<AtomicBool>,
    metrics: Arc<MonitorMetrics>,
) {
    while let Ok(event) = rx.recv() {
        if !is_running.load(Ordering::Acquire) {
            MonitorMetrics::add(&metrics.events_dropped, 1 + rx.len() as u64);
            debug!("Dispatch worker stopping, discarding queued events");
            break;
        }
        handler::invoke(&mut handler, &event, &metrics);
    }
    trace!("Dispatch worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarcam_serial::MockSerialSource;

    #[test]
    fn test_poll_loop_returns_source_when_stopped() {
        let (source, handle) = MockSerialSource::new();
        handle.push(vec![0xF8, 0x01, 0x00, 0x05, 0x40, 0x00, 0xFE]);

        let is_running = Arc::new(AtomicBool::new(true));
        let ctx = PollContext {
            config: MonitorConfig::default().with_poll_interval(Duration::from_millis(1)),
            is_running: is_running.clone(),
            metrics: Arc::new(MonitorMetrics::new()),
            last_event: Arc::new(ArcSwapOption::empty()),
        };
        let metrics = ctx.metrics.clone();

        let flag = is_running.clone();
        let mut received = Vec::new();
        let _source = poll_loop(source, ctx, |event| {
            received.push(event.distance_cm);
            flag.store(false, Ordering::Release);
        });

        assert_eq!(received, vec![50]);
        assert_eq!(metrics.snapshot().events_forwarded, 1);
        assert_eq!(metrics.snapshot().bytes_read, 7);
    }

    #[test]
    fn test_error_backoff_doubles_and_caps() {
        let base = Duration::from_millis(50);
        assert_eq!(error_backoff(base, 1), Duration::from_millis(50));
        assert_eq!(error_backoff(base, 2), Duration::from_millis(100));
        assert_eq!(error_backoff(base, 4), Duration::from_millis(400));
        assert_eq!(error_backoff(base, 10), MAX_ERROR_BACKOFF);
        assert_eq!(error_backoff(base, u32::MAX), MAX_ERROR_BACKOFF);
        // 轮询间隔本身超过上限时不缩短
        assert_eq!(error_backoff(Duration::from_secs(5), 3), Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_while_running_returns_early_when_stopped() {
        let is_running = AtomicBool::new(false);
        let start = Instant::now();
        sleep_while_running(&is_running, Duration::from_secs(5), Duration::from_millis(10));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}

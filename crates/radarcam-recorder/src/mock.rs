//! Mock 摄像头
//!
//! `start_recording` 在目标路径创建一个小文件，因此产物可以直接交给上传层测试。

use crate::camera::CameraConfig;
use crate::device::{CaptureBackend, CaptureDevice};
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
struct Shared {
    opens: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    closes: AtomicUsize,
    fail_open: AtomicUsize,
    fail_start: AtomicUsize,
    panic_on_start: AtomicBool,
    last_config: Mutex<Option<CameraConfig>>,
    last_path: Mutex<Option<PathBuf>>,
}

/// Mock 采集后端
pub struct MockCamera {
    shared: Arc<Shared>,
}

/// 测试侧句柄：读取调用计数、注入故障
#[derive(Clone)]
pub struct MockCameraHandle {
    shared: Arc<Shared>,
}

struct MockDevice {
    shared: Arc<Shared>,
    recording: bool,
}

impl MockCamera {
    pub fn new() -> (Self, MockCameraHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: shared.clone(),
            },
            MockCameraHandle { shared },
        )
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl MockCameraHandle {
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// 接下来 `n` 次 `open()` 失败
    pub fn fail_open(&self, n: usize) {
        self.shared.fail_open.store(n, Ordering::SeqCst);
    }

    /// 接下来 `n` 次 `start_recording()` 失败
    pub fn fail_start(&self, n: usize) {
        self.shared.fail_start.store(n, Ordering::SeqCst);
    }

    /// 下一次 `start_recording()` panic
    pub fn panic_on_start(&self) {
        self.shared.panic_on_start.store(true, Ordering::SeqCst);
    }

    pub fn last_config(&self) -> Option<CameraConfig> {
        self.shared.last_config.lock().clone()
    }

    pub fn last_path(&self) -> Option<PathBuf> {
        self.shared.last_path.lock().clone()
    }
}

impl CaptureBackend for MockCamera {
    fn open(&mut self, config: &CameraConfig) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        if take_failure(&self.shared.fail_open) {
            return Err(CaptureError::Device("mock camera not detected".into()));
        }
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        *self.shared.last_config.lock() = Some(config.clone());
        Ok(Box::new(MockDevice {
            shared: self.shared.clone(),
            recording: false,
        }))
    }
}

impl CaptureDevice for MockDevice {
    fn start_recording(&mut self, path: &Path, _bitrate: u32) -> Result<(), CaptureError> {
        if self.shared.panic_on_start.swap(false, Ordering::SeqCst) {
            panic!("mock camera crashed");
        }
        if take_failure(&self.shared.fail_start) {
            return Err(CaptureError::Device("mock encoder failure".into()));
        }
        if self.recording {
            return Err(CaptureError::AlreadyStarted);
        }
        fs::write(path, b"mock mp4 payload")?;
        self.recording = true;
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        *self.shared.last_path.lock() = Some(path.to_path_buf());
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), CaptureError> {
        if !self.recording {
            return Err(CaptureError::NotStarted);
        }
        self.recording = false;
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

//! Mock 传输后端
//!
//! 把上传内容保存在内存中，并支持注入连接/传输/quit 故障。

use crate::config::FtpConfig;
use crate::error::TransportError;
use crate::transport::{UploadConnection, UploadTransport};
use parking_lot::Mutex;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
struct Shared {
    connects: AtomicUsize,
    quits: AtomicUsize,
    forced_closes: AtomicUsize,
    fail_connect: AtomicUsize,
    fail_store: AtomicUsize,
    fail_quit: AtomicBool,
    stored: Mutex<Vec<(String, Vec<u8>)>>,
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Mock 传输后端
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// 测试侧句柄
#[derive(Clone)]
pub struct MockTransportHandle {
    shared: Arc<Shared>,
}

struct MockConnection {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: shared.clone(),
            },
            MockTransportHandle { shared },
        )
    }
}

impl MockTransportHandle {
    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn quits(&self) -> usize {
        self.shared.quits.load(Ordering::SeqCst)
    }

    pub fn forced_closes(&self) -> usize {
        self.shared.forced_closes.load(Ordering::SeqCst)
    }

    /// 接下来 `n` 次连接失败
    pub fn fail_connect(&self, n: usize) {
        self.shared.fail_connect.store(n, Ordering::SeqCst);
    }

    /// 接下来 `n` 次传输失败
    pub fn fail_store(&self, n: usize) {
        self.shared.fail_store.store(n, Ordering::SeqCst);
    }

    /// `quit` 一直失败
    pub fn fail_quit(&self) {
        self.shared.fail_quit.store(true, Ordering::SeqCst);
    }

    /// 已上传的 `(远端路径, 内容)`
    pub fn stored(&self) -> Vec<(String, Vec<u8>)> {
        self.shared.stored.lock().clone()
    }
}

impl UploadTransport for MockTransport {
    fn connect(&mut self, config: &FtpConfig) -> Result<Box<dyn UploadConnection>, TransportError> {
        if take_failure(&self.shared.fail_connect) {
            return Err(TransportError::Connect {
                address: config.address(),
                message: "connection refused".to_string(),
            });
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            shared: self.shared.clone(),
        }))
    }
}

impl UploadConnection for MockConnection {
    fn store(&mut self, remote_path: &str, reader: &mut dyn Read) -> Result<u64, TransportError> {
        if take_failure(&self.shared.fail_store) {
            return Err(TransportError::Transfer("426 transfer aborted".to_string()));
        }
        let mut data = Vec::new();
        let n = reader.read_to_end(&mut data)?;
        self.shared
            .stored
            .lock()
            .push((remote_path.to_string(), data));
        Ok(n as u64)
    }

    fn quit(&mut self) -> Result<(), TransportError> {
        if self.shared.fail_quit.load(Ordering::SeqCst) {
            return Err(TransportError::Transfer("421 service not available".to_string()));
        }
        self.shared.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.forced_closes.fetch_add(1, Ordering::SeqCst);
    }
}

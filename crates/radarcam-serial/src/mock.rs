//! 内存 Mock 串口
//!
//! 测试通过 [`MockSerialHandle`] 推送字节批次或注入错误；
//! 每次推送对应监视器的一次读取（一个批次内的字节一次性可读）。

use crate::{SerialError, SerialSource};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

enum Entry {
    Data(Vec<u8>),
    Error(io::ErrorKind),
    Disconnect,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<Entry>>,
    released: AtomicBool,
    reads: AtomicUsize,
}

/// Mock 串口字节源（交给监视器线程）
pub struct MockSerialSource {
    shared: Arc<Shared>,
    /// 当前批次中尚未读完的字节
    current: Vec<u8>,
}

/// 测试侧句柄
#[derive(Clone)]
pub struct MockSerialHandle {
    shared: Arc<Shared>,
}

impl MockSerialSource {
    pub fn new() -> (Self, MockSerialHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: shared.clone(),
                current: Vec::new(),
            },
            MockSerialHandle { shared },
        )
    }
}

impl MockSerialHandle {
    /// 推送一个字节批次
    pub fn push(&self, bytes: impl Into<Vec<u8>>) {
        self.shared.queue.lock().push_back(Entry::Data(bytes.into()));
    }

    /// 下一次探测返回 IO 错误
    pub fn fail_next(&self, kind: io::ErrorKind) {
        self.shared.queue.lock().push_back(Entry::Error(kind));
    }

    /// 下一次探测返回设备断开
    pub fn disconnect(&self) {
        self.shared.queue.lock().push_back(Entry::Disconnect);
    }

    /// 尚未被读取的批次数
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// 成功读取的次数
    pub fn reads(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }
}

impl SerialSource for MockSerialSource {
    fn bytes_available(&mut self) -> Result<usize, SerialError> {
        if self.shared.released.load(Ordering::SeqCst) {
            return Err(SerialError::Released);
        }
        if !self.current.is_empty() {
            return Ok(self.current.len());
        }

        match self.shared.queue.lock().pop_front() {
            Some(Entry::Data(bytes)) => {
                self.current = bytes;
                Ok(self.current.len())
            },
            Some(Entry::Error(kind)) => Err(SerialError::Io(io::Error::new(kind, "mock failure"))),
            Some(Entry::Disconnect) => Err(SerialError::Disconnected("mock".to_string())),
            None => Ok(0),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.drain(..n);
        if n > 0 {
            self.shared.reads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(n)
    }

    fn release(&mut self) {
        self.shared.released.store(true, Ordering::SeqCst);
    }
}

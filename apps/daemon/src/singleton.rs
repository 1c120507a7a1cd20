//! 串口设备锁
//!
//! 每个雷达串口对应一个锁文件，同一块板子上可以同时运行监视不同串口的实例，
//! 但同一个串口只能被一个进程打开。锁文件内容为 `<pid> <device>`，
//! 抢锁失败时据此报告占用者。

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("{device} is already in use by radarcam (pid {})", describe_pid(.pid))]
    Held { device: String, pid: Option<u32> },

    #[error("Lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn describe_pid(pid: &Option<u32>) -> String {
    pid.map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
}

/// 串口设备的进程间独占锁；进程退出（含崩溃）时由 OS 释放
#[derive(Debug)]
pub struct DeviceLock {
    file: File,
    path: PathBuf,
    device: String,
}

impl DeviceLock {
    /// 在 `dir` 下为 `device` 抢锁
    pub fn acquire_in(dir: &Path, device: &str) -> Result<Self, LockError> {
        Self::acquire(&lock_file_for(dir, device), device)
    }

    /// 以指定的锁文件为 `device` 抢锁（非阻塞）
    pub fn acquire(path: &Path, device: &str) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        // append：截断后写入总是从文件头开始；拿到锁之前不截断
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(io_err)?;

        if !file.try_lock_exclusive().map_err(io_err)? {
            return Err(LockError::Held {
                device: device.to_string(),
                pid: read_holder(&mut file),
            });
        }

        file.set_len(0).map_err(io_err)?;
        writeln!(file, "{} {}", std::process::id(), device).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            device: device.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Drop for DeviceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// 读取锁文件中记录的 PID
fn read_holder(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    content.split_whitespace().next()?.parse().ok()
}

/// `/dev/ttyS0` → `<dir>/radarcam-ttyS0.lock`
pub fn lock_file_for(dir: &Path, device: &str) -> PathBuf {
    let name: String = device
        .trim_start_matches("/dev/")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    dir.join(format!("radarcam-{name}.lock"))
}

/// 锁文件目录：`$XDG_RUNTIME_DIR`，否则系统临时目录
pub fn default_lock_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lock_records_pid_and_device() {
        let dir = tempfile::tempdir().unwrap();

        let lock = DeviceLock::acquire_in(dir.path(), "/dev/ttyS0").unwrap();
        assert_eq!(lock.path(), dir.path().join("radarcam-ttyS0.lock"));
        assert_eq!(lock.device(), "/dev/ttyS0");

        let content = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content, format!("{} /dev/ttyS0\n", std::process::id()));
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();

        let _held = DeviceLock::acquire_in(dir.path(), "/dev/ttyAMA0").unwrap();
        // flock 绑定在打开的文件描述上，同一进程再次打开同样会冲突
        match DeviceLock::acquire_in(dir.path(), "/dev/ttyAMA0") {
            Err(LockError::Held { device, pid }) => {
                assert_eq!(device, "/dev/ttyAMA0");
                assert_eq!(pid, Some(std::process::id()));
            },
            other => panic!("unexpected result: {other:?}"),
        }

        let err = DeviceLock::acquire_in(dir.path(), "/dev/ttyAMA0").unwrap_err();
        assert!(err.to_string().contains(&format!("pid {}", std::process::id())));
    }

    #[test]
    fn test_released_lock_can_be_reacquired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("radar.lock");

        let lock = DeviceLock::acquire(&path, "/dev/ttyS0").unwrap();
        drop(lock);

        // 旧内容被覆盖而不是追加
        let _lock = DeviceLock::acquire(&path, "/dev/ttyUSB1").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.ends_with(" /dev/ttyUSB1\n"));
    }

    #[test]
    fn test_different_devices_do_not_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let _a = DeviceLock::acquire_in(dir.path(), "/dev/ttyS0").unwrap();
        let _b = DeviceLock::acquire_in(dir.path(), "/dev/ttyUSB0").unwrap();
    }

    #[test]
    fn test_lock_file_name_from_device() {
        let dir = Path::new("/run/user/1000");
        assert_eq!(
            lock_file_for(dir, "/dev/ttyS0"),
            dir.join("radarcam-ttyS0.lock")
        );
        assert_eq!(
            lock_file_for(dir, "/dev/serial/by-id/usb-1a86:7523"),
            dir.join("radarcam-serial_by-id_usb-1a86_7523.lock")
        );
    }
}

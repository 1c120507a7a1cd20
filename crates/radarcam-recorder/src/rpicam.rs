//! `rpicam-vid` 子进程后端
//!
//! 每次录制启动一个 `rpicam-vid -t 0` 子进程，直接输出 MP4（libav 封装）。
//! 停止时先发送 SIGINT 让其完成文件写入，超时后强制 kill。
//! stderr 由后台线程持续读取（避免管道写满阻塞子进程），失败时错误信息附带最后几行输出。

use crate::camera::{CameraConfig, Rotation};
use crate::device::{CaptureBackend, CaptureDevice};
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 默认可执行文件
pub const DEFAULT_PROGRAM: &str = "rpicam-vid";

/// 等待子进程在 SIGINT 后退出的最长时间
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 错误信息中保留的 stderr 行数
const STDERR_TAIL_LINES: usize = 8;

/// `rpicam-vid` 后端
#[derive(Debug, Clone)]
pub struct RpicamBackend {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl Default for RpicamBackend {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl RpicamBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// 追加传给 `rpicam-vid` 的参数（如 `--camera 1`）
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl CaptureBackend for RpicamBackend {
    fn open(&mut self, config: &CameraConfig) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        // 探测可执行文件是否存在
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CaptureError::Spawn {
                program: self.program_name(),
                source,
            })?;
        let version = String::from_utf8_lossy(&output.stdout);
        info!(
            "Camera backend ready: {}",
            version.lines().next().unwrap_or("rpicam-vid")
        );

        Ok(Box::new(RpicamDevice {
            program: self.program.clone(),
            base_args: camera_args(config, &self.extra_args),
            capture: None,
        }))
    }
}

/// 与输出路径无关的参数
fn camera_args(config: &CameraConfig, extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "-t".to_string(),
        "0".to_string(),
        "--nopreview".to_string(),
        "--width".to_string(),
        config.width.to_string(),
        "--height".to_string(),
        config.height.to_string(),
        "--framerate".to_string(),
        config.fps.to_string(),
        "--codec".to_string(),
        "libav".to_string(),
        "--libav-format".to_string(),
        "mp4".to_string(),
    ];

    if config.rotation != Rotation::None {
        args.push("--rotation".to_string());
        args.push(config.rotation.degrees().to_string());
    }
    if config.hflip {
        args.push("--hflip".to_string());
    }
    if config.vflip {
        args.push("--vflip".to_string());
    }
    if !config.zoom.is_identity() {
        let z = config.zoom;
        args.push("--roi".to_string());
        args.push(format!("{},{},{},{}", z.x, z.y, z.width, z.height));
    }

    args.extend(extra.iter().cloned());
    args
}

/// 子进程 stderr 的尾部缓冲
struct StderrTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    reader: Option<JoinHandle<()>>,
}

impl StderrTail {
    fn spawn<R: Read + Send + 'static>(stream: R) -> std::io::Result<Self> {
        let lines = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let reader = thread::Builder::new().name("rpicam-stderr".into()).spawn({
            let lines = lines.clone();
            move || {
                for line in BufReader::new(stream).lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let mut lines = lines.lock();
                    if lines.len() == STDERR_TAIL_LINES {
                        lines.pop_front();
                    }
                    lines.push_back(line.to_string());
                }
            }
        })?;
        Ok(Self {
            lines,
            reader: Some(reader),
        })
    }

    /// 等待读取线程结束（子进程退出后管道关闭），返回最后几行
    fn finish(mut self) -> String {
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        self.lines.lock().iter().cloned().collect::<Vec<_>>().join(" | ")
    }
}

/// 退出状态加上 stderr 尾部
fn describe_exit(status: ExitStatus, stderr: &str) -> String {
    if stderr.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {stderr}")
    }
}

/// 一次录制对应的子进程
struct Capture {
    child: Child,
    stderr: StderrTail,
}

struct RpicamDevice {
    program: PathBuf,
    base_args: Vec<String>,
    capture: Option<Capture>,
}

impl RpicamDevice {
    fn recording_args(&self, path: &Path, bitrate: u32) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("--bitrate".to_string());
        args.push(bitrate.to_string());
        args.push("-o".to_string());
        args.push(path.display().to_string());
        args
    }
}

#[cfg(unix)]
fn interrupt(child: &Child) -> Result<(), CaptureError> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT)
        .map_err(|e| CaptureError::Device(format!("failed to signal capture process: {e}")))
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) -> Result<(), CaptureError> {
    Err(CaptureError::Device("graceful stop not supported".into()))
}

/// 等待子进程退出，超时返回 `None`
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>, CaptureError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

impl CaptureDevice for RpicamDevice {
    fn start_recording(&mut self, path: &Path, bitrate: u32) -> Result<(), CaptureError> {
        if self.capture.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let args = self.recording_args(path, bitrate);
        debug!("Launching {} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stderr = match child.stderr.take().map(StderrTail::spawn) {
            Some(Ok(stderr)) => stderr,
            Some(Err(e)) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CaptureError::Io(e));
            },
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CaptureError::Device("capture process has no stderr pipe".into()));
            },
        };

        self.capture = Some(Capture { child, stderr });
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), CaptureError> {
        let Capture { mut child, stderr } = self.capture.take().ok_or(CaptureError::NotStarted)?;

        // 录制期间进程已自行退出：说明采集失败
        if let Some(status) = child.try_wait()? {
            return Err(CaptureError::Exited(describe_exit(status, &stderr.finish())));
        }

        if let Err(e) = interrupt(&child) {
            warn!("{}; killing capture process", e);
        } else if let Some(status) = wait_with_timeout(&mut child, STOP_TIMEOUT)? {
            let tail = stderr.finish();
            if status.success() {
                debug!("Capture process finished: {}", status);
            } else {
                warn!("Capture process finished with {}", describe_exit(status, &tail));
            }
            return Ok(());
        } else {
            warn!(
                "Capture process did not exit within {:?}, killing it",
                STOP_TIMEOUT
            );
        }

        child.kill()?;
        child.wait()?;
        stderr.finish();
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        if let Some(Capture { mut child, stderr }) = self.capture.take() {
            warn!("Killing capture process left running at close");
            child.kill()?;
            child.wait()?;
            stderr.finish();
        }
        Ok(())
    }
}

impl Drop for RpicamDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to stop capture process: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Zoom;

    #[test]
    fn test_default_camera_args() {
        let args = camera_args(&CameraConfig::default(), &[]);
        assert_eq!(
            args,
            vec![
                "-t",
                "0",
                "--nopreview",
                "--width",
                "1920",
                "--height",
                "1080",
                "--framerate",
                "30",
                "--codec",
                "libav",
                "--libav-format",
                "mp4",
            ]
        );
    }

    #[test]
    fn test_transform_and_roi_args() {
        let config = CameraConfig {
            zoom: Zoom::new(0.25, 0.25, 0.5, 0.5),
            rotation: Rotation::Half,
            hflip: true,
            vflip: true,
            ..CameraConfig::default()
        };
        let args = camera_args(&config, &["--camera".to_string(), "1".to_string()]);
        let joined = args.join(" ");
        assert!(joined.contains("--rotation 180"));
        assert!(joined.contains("--hflip"));
        assert!(joined.contains("--vflip"));
        assert!(joined.contains("--roi 0.25,0.25,0.5,0.5"));
        assert!(joined.ends_with("--camera 1"));
    }

    #[test]
    fn test_recording_args_include_output() {
        let device = RpicamDevice {
            program: PathBuf::from(DEFAULT_PROGRAM),
            base_args: vec!["-t".into(), "0".into()],
            capture: None,
        };
        let args = device.recording_args(Path::new("/tmp/motion_x.mp4"), 1_900_000);
        assert_eq!(
            args,
            vec!["-t", "0", "--bitrate", "1900000", "-o", "/tmp/motion_x.mp4"]
        );
    }

    #[test]
    fn test_missing_program_fails_to_open() {
        let mut backend = RpicamBackend::new("/nonexistent/rpicam-vid");
        match backend.open(&CameraConfig::default()) {
            Err(CaptureError::Spawn { program, .. }) => {
                assert_eq!(program, "/nonexistent/rpicam-vid");
            },
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opening a missing binary should fail"),
        }
    }

    #[test]
    fn test_stop_without_start() {
        let mut device = RpicamDevice {
            program: PathBuf::from(DEFAULT_PROGRAM),
            base_args: Vec::new(),
            capture: None,
        };
        assert!(matches!(
            device.stop_recording(),
            Err(CaptureError::NotStarted)
        ));
        assert!(device.close().is_ok());
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let output: String = (1..=20).map(|i| format!("line {i}\n\n")).collect();
        let tail = StderrTail::spawn(std::io::Cursor::new(output.into_bytes()))
            .unwrap()
            .finish();
        let lines: Vec<&str> = tail.split(" | ").collect();
        assert_eq!(lines.len(), STDERR_TAIL_LINES);
        assert_eq!(lines.first(), Some(&"line 13"));
        assert_eq!(lines.last(), Some(&"line 20"));
    }

    #[cfg(unix)]
    #[test]
    fn test_early_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        // 剩余的录制参数成为脚本的位置参数
        let mut device = RpicamDevice {
            program: PathBuf::from("/bin/sh"),
            base_args: vec![
                "-c".into(),
                "echo 'ERROR: *** no cameras available ***' >&2; exit 1".into(),
                "rpicam-vid".into(),
            ],
            capture: None,
        };
        device
            .start_recording(&dir.path().join("motion_x.mp4"), 1_900_000)
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let capture = device.capture.as_mut().unwrap();
            if capture.child.try_wait().unwrap().is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        match device.stop_recording() {
            Err(CaptureError::Exited(message)) => {
                assert!(message.contains("no cameras available"), "{message}");
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

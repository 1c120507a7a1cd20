//! 检测 → 录像 → 上传
//!
//! 冷却计时由管线独占：检查与更新在同一把锁下完成，且只有录制成功才会更新。
//! 锁顺序：冷却锁 → 录像状态锁；上传开始前冷却锁已释放。

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use radarcam_driver::{DetectionEvent, DetectionHandler, HandlerError};
use radarcam_recorder::{RecordingArtifact, RecordingError, Recorder};
use radarcam_upload::Uploader;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 默认冷却时间
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// 单个事件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// 距上次成功录制不足冷却时间，忽略
    CoolingDown,
    /// 录像协调器忙
    RecorderBusy,
    /// 录制失败（已记录日志）
    RecordingFailed,
    /// 录制成功
    Recorded {
        artifact: RecordingArtifact,
        upload: UploadOutcome,
    },
}

/// 录制产物的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// 上传失败，本地文件保留
    Failed,
    /// 未启用上传，本地文件保留
    Disabled,
}

/// 管线计数
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub events: AtomicU64,
    pub cooled_down: AtomicU64,
    pub recordings: AtomicU64,
    pub recording_failures: AtomicU64,
    pub uploads: AtomicU64,
    pub upload_failures: AtomicU64,
}

/// 检测管线
pub struct DetectionPipeline {
    recorder: Arc<Recorder>,
    uploader: Option<Arc<Uploader>>,
    duration: Duration,
    cooldown: Duration,
    last_recording: Mutex<Option<Instant>>,
    stats: PipelineStats,
}

impl DetectionPipeline {
    pub fn new(recorder: Arc<Recorder>, uploader: Option<Arc<Uploader>>, duration: Duration) -> Self {
        Self {
            recorder,
            uploader,
            duration,
            cooldown: DEFAULT_COOLDOWN,
            last_recording: Mutex::new(None),
            stats: PipelineStats::default(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// 上次成功录制的时刻
    pub fn last_recording(&self) -> Option<Instant> {
        *self.last_recording.lock()
    }

    /// 以当前时刻处理事件
    pub fn handle(&self, event: &DetectionEvent) -> PipelineOutcome {
        self.handle_at(event, Instant::now())
    }

    /// 以给定时刻 `now` 处理事件
    pub fn handle_at(&self, event: &DetectionEvent, now: Instant) -> PipelineOutcome {
        self.stats.events.fetch_add(1, Ordering::Relaxed);

        let mut last = self.last_recording.lock();
        if let Some(previous) = *last
            && now.saturating_duration_since(previous) < self.cooldown
        {
            self.stats.cooled_down.fetch_add(1, Ordering::Relaxed);
            debug!("Within recording cooldown, ignoring detection");
            return PipelineOutcome::CoolingDown;
        }

        log_detection(event);

        let artifact = match self.recorder.record(self.duration) {
            Ok(artifact) => artifact,
            Err(RecordingError::AlreadyRecording) => return PipelineOutcome::RecorderBusy,
            Err(RecordingError::RecordingFailed(_)) => {
                self.stats.recording_failures.fetch_add(1, Ordering::Relaxed);
                return PipelineOutcome::RecordingFailed;
            },
        };
        *last = Some(now);
        drop(last);
        self.stats.recordings.fetch_add(1, Ordering::Relaxed);

        let upload = self.dispatch_artifact(&artifact);
        PipelineOutcome::Recorded { artifact, upload }
    }

    fn dispatch_artifact(&self, artifact: &RecordingArtifact) -> UploadOutcome {
        let Some(uploader) = &self.uploader else {
            info!("FTP disabled, keeping local file {}", artifact.path.display());
            return UploadOutcome::Disabled;
        };

        match uploader.upload(&artifact.path) {
            Ok(()) => {
                self.stats.uploads.fetch_add(1, Ordering::Relaxed);
                UploadOutcome::Uploaded
            },
            Err(e) => {
                self.stats.upload_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Upload failed ({}), keeping local file {}",
                    e,
                    artifact.path.display()
                );
                UploadOutcome::Failed
            },
        }
    }

    /// 包装成监视器回调
    ///
    /// 录制与上传失败都已在管线内部记录，回调本身总是返回 `Ok`。
    pub fn handler(self: &Arc<Self>) -> impl DetectionHandler + 'static {
        let pipeline = Arc::clone(self);
        move |event: &DetectionEvent| -> Result<(), HandlerError> {
            pipeline.handle(event);
            Ok(())
        }
    }
}

fn log_detection(event: &DetectionEvent) {
    let local: DateTime<Local> = event.wall_clock.into();
    info!("Target detected at {}", local.format("%H:%M:%S"));
    if event.moving {
        info!(
            "Moving target at {}cm (strength: {})",
            event.distance_cm, event.signal_strength
        );
    }
    if event.stationary {
        info!(
            "Stationary target at {}cm (strength: {})",
            event.distance_cm, event.signal_strength
        );
    }
}

//! radarcam 守护进程
//!
//! 监视 LD2410 雷达，检测到目标时录像并上传，直到收到 Ctrl+C / SIGTERM。

mod singleton;

use anyhow::{Context, Result};
use clap::Parser;
use radarcam_sdk::logging::{DEFAULT_DIRECTIVE, env_filter};
use radarcam_sdk::{SecurityCamBuilder, SecurityCamConfig};
use singleton::DeviceLock;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// 日志文件名（按天轮转，实际文件名带日期后缀）
const LOG_FILE_NAME: &str = "security_cam.log";

/// 文件日志总是记录到 DEBUG
const FILE_DIRECTIVE: &str = "radarcam=debug";

#[derive(Parser, Debug)]
#[command(name = "radarcam")]
#[command(about = "LD2410 radar triggered security camera", long_about = None)]
struct Args {
    /// TOML 配置文件；未指定时只使用默认值和环境变量
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志文件目录
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// 串口锁文件路径（默认 `$XDG_RUNTIME_DIR/radarcam-<device>.lock`）
    #[arg(long)]
    lock_file: Option<PathBuf>,

    /// 不上传录像（覆盖配置中的 FTP 设置）
    #[arg(long)]
    no_upload: bool,
}

/// 控制台 + 文件双输出
///
/// 返回的 guard 必须存活到进程退出，否则缓冲中的日志会丢失。
fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter(DEFAULT_DIRECTIVE)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(EnvFilter::new(FILE_DIRECTIVE)),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args.log_dir)?;

    let mut config = SecurityCamConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;

    // 打开串口之前先占住设备
    let device = config.sensor.device.clone();
    let lock = match &args.lock_file {
        Some(path) => DeviceLock::acquire(path, &device),
        None => DeviceLock::acquire_in(&singleton::default_lock_dir(), &device),
    }
    .context("failed to lock sensor device")?;
    debug!("Holding {} via {}", lock.device(), lock.path().display());

    if args.no_upload && config.ftp.enabled {
        warn!("FTP upload disabled from the command line");
        config.ftp.enabled = false;
    }

    info!("Starting LD2410 security camera");
    info!("Sensor: {} ({})", config.sensor.device, config.sensor.framing);
    info!(
        "Recording: {}s clips into {}",
        config.recording.duration_secs,
        config.recording.path.display()
    );

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("failed to install signal handler")?;

    let mut cam = SecurityCamBuilder::new(config)
        .build()
        .context("failed to initialize security camera")?;
    cam.start().context("failed to start sensor monitor")?;

    // 发送端随信号处理器常驻，recv 只会因信号返回
    let _ = shutdown_rx.recv();
    info!("Received interrupt signal, shutting down");

    cam.shutdown();
    drop(lock);
    let metrics = cam.metrics();
    info!(
        "Frames parsed: {}, events forwarded: {}, debounced: {}",
        metrics.frames_parsed, metrics.events_forwarded, metrics.events_debounced
    );
    Ok(())
}

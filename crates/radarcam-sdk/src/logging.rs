//! 日志初始化辅助

use tracing_subscriber::EnvFilter;

/// 控制台默认日志级别
pub const DEFAULT_DIRECTIVE: &str = "radarcam=info";

/// 以 `RUST_LOG` 为基础，追加 `directive` 的过滤器
pub fn env_filter(directive: &str) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(e) => {
            eprintln!("Ignoring invalid log directive {directive:?}: {e}");
            filter
        },
    }
}

/// 只输出到控制台的日志（测试、示例使用）
///
/// 重复调用安全：已经安装过全局 subscriber 时什么也不做。
pub fn init_console() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_DIRECTIVE))
        .try_init();
}

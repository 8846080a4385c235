use anyhow::Result;
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::{self, EnvFilter, fmt::format::FmtSpan};
use userprog::{Args, build_kernel_run_blocking};

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_target(false) // 不显示目标模块
        .with_thread_ids(true) // 显示线程ID
        .with_file(true) // 显示文件名
        .with_line_number(true) // 显示行号
        .with_span_events(FmtSpan::ACTIVE) // 跟踪span的生命周期
        .with_writer(std::io::stderr) // 日志与控制台输出分开
        .init();

    // 解析命令行参数
    let args = Args::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "启动陷入层驱动");
    info!(config = %args.config, "配置文件");

    build_kernel_run_blocking(args)
}

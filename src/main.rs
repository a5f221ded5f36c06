use anyhow::Context;
use backupd_lib::commands::spawn_signal_listener;
use backupd_lib::config::{ConfigNotes, DaemonConfig, DEFAULT_CONFIG_PATH};
use backupd_lib::core::{RunStateController, Scheduler, SyncEngine};
use backupd_lib::logging::init_logging;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// backupd - 定时把源目录镜像到备份目录
///
/// 运行时通过信号控制：SIGTSTP 暂停，SIGCONT 继续，SIGUSR1 查询状态，SIGTERM 终止。
#[derive(Parser)]
#[command(name = "backupd")]
#[command(version)]
#[command(about = "Periodic directory backup daemon")]
struct Cli {
    /// 配置文件路径
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 只执行一轮备份然后退出
    #[arg(long)]
    once: bool,

    /// 覆盖配置中的日志级别
    #[arg(long)]
    log_level: Option<tracing::Level>,
}

async fn run_daemon(config: &DaemonConfig, once: bool) -> anyhow::Result<()> {
    let controller = RunStateController::new();
    let scheduler = Scheduler::new(
        SyncEngine::new(config),
        controller.clone(),
        config.effective_interval(),
    );

    if once {
        scheduler.run_once().await.context("备份失败")?;
        return Ok(());
    }

    spawn_signal_listener(controller).context("无法注册信号处理")?;
    scheduler.run().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 先加载配置再初始化日志，加载错误和跳过的配置项在日志就绪后记录
    let (config, notes, load_error) = match DaemonConfig::load(&cli.config) {
        Ok((config, notes)) => (config, notes, None),
        Err(e) => (DaemonConfig::default(), ConfigNotes::default(), Some(e)),
    };
    let log_guard = init_logging(&config, cli.log_level);

    info!("守护进程启动 (pid {})", std::process::id());
    if let Some(e) = load_error {
        error!("加载配置失败，使用空配置继续运行: {}", e);
    }
    notes.log();
    debug!(
        "生效配置: {}",
        serde_json::to_string(&config).unwrap_or_default()
    );
    if config.interval_seconds == 0 {
        warn!("backup_frequency 未设置或为 0，使用最小间隔 1 秒");
    }

    let code = match run_daemon(&config, cli.once).await {
        Ok(()) => {
            info!("守护进程已终止");
            0
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    // 刷新并关闭日志后直接退出，不等待仍在进行的复制任务
    log_guard.close();
    std::process::exit(code);
}

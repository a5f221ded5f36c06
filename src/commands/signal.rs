//! 信号到控制命令的转换

use super::ControlCommand;
use crate::core::state::RunStateController;
use crate::error::Result;

/// 信号与控制命令的对应关系
#[cfg(unix)]
pub const SIGNAL_COMMANDS: [(libc::c_int, ControlCommand); 5] = [
    (libc::SIGTSTP, ControlCommand::Pause),
    (libc::SIGCONT, ControlCommand::Resume),
    (libc::SIGTERM, ControlCommand::Terminate),
    (libc::SIGINT, ControlCommand::Terminate),
    (libc::SIGUSR1, ControlCommand::Status),
];

/// 注册信号处理，每种信号由一个后台任务转发给控制器
///
/// 必须在 tokio 运行时中调用。任何一个信号注册失败都返回错误。
#[cfg(unix)]
pub fn spawn_signal_listener(controller: RunStateController) -> Result<()> {
    use crate::error::BackupError;
    use tokio::signal::unix::{signal, SignalKind};

    for (signo, command) in SIGNAL_COMMANDS {
        let mut stream = signal(SignalKind::from_raw(signo)).map_err(BackupError::SignalHandler)?;
        let controller = controller.clone();

        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                tracing::debug!("收到信号 {} -> {}", signo, command);
                controller.apply(command);
            }
        });
    }

    Ok(())
}

/// 非 unix 平台只支持 Ctrl-C 终止
#[cfg(not(unix))]
pub fn spawn_signal_listener(controller: RunStateController) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            controller.apply(ControlCommand::Terminate);
        }
    });
    Ok(())
}

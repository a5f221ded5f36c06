//! 控制命令
//!
//! 守护进程没有网络接口，运行时只接受四种无参数的控制命令，由进程信号触发。

pub mod signal;

pub use signal::spawn_signal_listener;

/// 控制命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// 暂停：跳过后续的备份轮次
    Pause,
    /// 继续：恢复备份轮次
    Resume,
    /// 终止：停止调度循环并退出
    Terminate,
    /// 查询：只记录当前状态
    Status,
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::Pause => write!(f, "pause"),
            ControlCommand::Resume => write!(f, "resume"),
            ControlCommand::Terminate => write!(f, "terminate"),
            ControlCommand::Status => write!(f, "status"),
        }
    }
}

//! 运行状态管理
//!
//! 运行状态只由外部控制命令（信号）修改，调度循环每轮开始前读取一次。

use crate::commands::ControlCommand;
use crate::core::engine::RoundSummary;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::info;

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Paused,
    /// 终态，进入后不再离开
    Stopping,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Paused => write!(f, "paused"),
            RunState::Stopping => write!(f, "stopping"),
        }
    }
}

/// 状态查询时输出的快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state: RunState,
    pub rounds_completed: u64,
    pub last_round: Option<RoundSummary>,
}

#[derive(Debug, Default)]
struct History {
    rounds_completed: u64,
    last_round: Option<RoundSummary>,
}

/// 运行状态控制器
///
/// 内部是一个单槽 watch 通道，可以廉价克隆并在信号任务和调度循环之间共享。
#[derive(Debug, Clone)]
pub struct RunStateController {
    state: Arc<watch::Sender<RunState>>,
    history: Arc<Mutex<History>>,
}

impl RunStateController {
    /// 创建控制器，初始状态为 Running
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunState::Running);
        Self {
            state: Arc::new(tx),
            history: Arc::new(Mutex::new(History::default())),
        }
    }

    /// 当前状态
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// 执行一条控制命令，记录日志并返回执行后的状态
    ///
    /// Stopping 是终态：之后的暂停、恢复命令被忽略。目标状态与当前状态相同时只重新记录日志。
    pub fn apply(&self, command: ControlCommand) -> RunState {
        let target = match command {
            ControlCommand::Pause => Some(RunState::Paused),
            ControlCommand::Resume => Some(RunState::Running),
            ControlCommand::Terminate => Some(RunState::Stopping),
            ControlCommand::Status => None,
        };

        if let Some(target) = target {
            self.state.send_if_modified(|current| {
                if *current == target || *current == RunState::Stopping {
                    return false;
                }
                *current = target;
                true
            });
        }

        let state = self.state();
        match command {
            ControlCommand::Pause => info!("暂停 (当前状态: {})", state),
            ControlCommand::Resume => info!("继续 (当前状态: {})", state),
            ControlCommand::Terminate => info!("守护进程正在终止"),
            ControlCommand::Status => self.log_status(),
        }
        state
    }

    /// 记录一轮完成的备份，供状态查询使用
    pub fn record_round(&self, summary: RoundSummary) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.rounds_completed += 1;
        history.last_round = Some(summary);
    }

    /// 当前状态快照
    pub fn status_report(&self) -> StatusReport {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        StatusReport {
            state: self.state(),
            rounds_completed: history.rounds_completed,
            last_round: history.last_round.clone(),
        }
    }

    fn log_status(&self) {
        let report = self.status_report();
        let snapshot = serde_json::to_string(&report).unwrap_or_default();
        match report.state {
            RunState::Paused => info!("守护进程状态: 已暂停 {}", snapshot),
            RunState::Running => info!("守护进程状态: 运行中 {}", snapshot),
            RunState::Stopping => info!("守护进程状态: 正在终止 {}", snapshot),
        }
    }
}

impl Default for RunStateController {
    fn default() -> Self {
        Self::new()
    }
}

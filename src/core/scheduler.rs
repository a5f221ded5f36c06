//! 调度循环

use crate::core::engine::{RoundSummary, SyncEngine};
use crate::core::state::{RunState, RunStateController};
use crate::error::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// 调度循环退出时的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    /// 完整执行的轮数
    pub rounds_run: u64,
    /// 因源目录不可用而放弃的轮数
    pub rounds_failed: u64,
}

/// 调度器：按固定间隔触发备份，直到收到终止命令
pub struct Scheduler {
    engine: SyncEngine,
    controller: RunStateController,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: SyncEngine, controller: RunStateController, interval: Duration) -> Self {
        Self {
            engine,
            controller,
            interval,
        }
    }

    /// 执行单独一轮，并记录到状态历史
    pub async fn run_once(&self) -> Result<RoundSummary> {
        let summary = self.engine.run_round().await?;
        self.controller.record_round(summary.clone());
        Ok(summary)
    }

    /// 运行调度循环
    ///
    /// 每次迭代开始时读取运行状态：Running 时执行一轮再等待一个间隔；Paused 时只等待。
    /// 等待期间状态变化会立即唤醒循环。轮次进行中收到暂停不会打断本轮；
    /// 收到终止则立即返回，不等待进行中的复制。
    pub async fn run(&self) -> LoopReport {
        let mut report = LoopReport::default();
        let mut state_rx = self.controller.subscribe();

        loop {
            let state = *state_rx.borrow_and_update();
            match state {
                RunState::Stopping => break,
                RunState::Paused => {
                    debug!("已暂停，跳过本轮");
                }
                RunState::Running => {
                    let mut stop_rx = self.controller.subscribe();
                    tokio::select! {
                        result = self.run_once() => match result {
                            Ok(_) => report.rounds_run += 1,
                            // 错误已在引擎中记录，下一个间隔重试
                            Err(_) => report.rounds_failed += 1,
                        },
                        _ = wait_for_stop(&mut stop_rx) => {
                            info!("收到终止命令，放弃进行中的备份");
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = state_rx.changed() => {
                    debug!("运行状态变化，提前结束等待");
                }
            }
        }

        info!(
            "调度循环退出: 完成 {} 轮, 失败 {} 轮",
            report.rounds_run, report.rounds_failed
        );
        report
    }
}

/// 等待直到状态变为 Stopping
async fn wait_for_stop(rx: &mut watch::Receiver<RunState>) {
    loop {
        if *rx.borrow_and_update() == RunState::Stopping {
            return;
        }
        if rx.changed().await.is_err() {
            // 发送端已关闭，状态不会再变化
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ControlCommand;
    use crate::config::DaemonConfig;
    use std::fs;
    use std::path::Path;

    const TICK: Duration = Duration::from_millis(50);

    fn scheduler_for(source: &Path, backup: &Path, controller: &RunStateController) -> Scheduler {
        let config = DaemonConfig {
            source_dir: source.to_path_buf(),
            backup_dir: backup.to_path_buf(),
            ..Default::default()
        };
        Scheduler::new(SyncEngine::new(&config), controller.clone(), TICK)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(TICK).await;
        }
        condition()
    }

    #[tokio::test]
    async fn terminate_before_start_runs_no_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let controller = RunStateController::new();
        controller.apply(ControlCommand::Terminate);

        let report = scheduler_for(dir.path(), &dir.path().join("dst"), &controller)
            .run()
            .await;

        assert_eq!(report, LoopReport::default());
        assert!(!dir.path().join("dst").exists());
    }

    #[tokio::test]
    async fn paused_loop_skips_rounds_until_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        let backup = dir.path().join("dst");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.txt"), b"a").unwrap();

        let controller = RunStateController::new();
        controller.apply(ControlCommand::Pause);
        let scheduler = scheduler_for(&source, &backup, &controller);
        let handle = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(TICK * 4).await;
        assert!(!backup.exists());

        controller.apply(ControlCommand::Resume);
        assert!(wait_until(|| backup.join("a.txt").exists()).await);

        controller.apply(ControlCommand::Terminate);
        let report = handle.await.unwrap();
        assert!(report.rounds_run >= 1);
        assert_eq!(report.rounds_failed, 0);
    }

    #[tokio::test]
    async fn missing_source_keeps_looping() {
        let dir = tempfile::tempdir().unwrap();
        let controller = RunStateController::new();
        let scheduler =
            scheduler_for(&dir.path().join("missing"), &dir.path().join("dst"), &controller);
        let observer = controller.clone();
        let handle = tokio::spawn(async move { scheduler.run().await });

        // 失败的轮次不计入历史，用调度器退出时的统计判断
        tokio::time::sleep(TICK * 6).await;
        observer.apply(ControlCommand::Terminate);
        let report = handle.await.unwrap();

        assert_eq!(report.rounds_run, 0);
        assert!(report.rounds_failed >= 2);
        assert_eq!(observer.status_report().rounds_completed, 0);
    }

    #[tokio::test]
    async fn run_once_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.txt"), b"a").unwrap();
        let controller = RunStateController::new();

        let summary = scheduler_for(&source, &dir.path().join("dst"), &controller)
            .run_once()
            .await
            .unwrap();

        assert_eq!(summary.copied, 1);
        assert_eq!(controller.status_report().rounds_completed, 1);
    }
}

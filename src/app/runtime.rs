// ==========================================
// 反应釜批次排程看板 - 运行时循环
// ==========================================
// 职责: 每秒驱动一次看板重算；自动推进计时到期时立即补一次重算
// 说明: 计时与重算共用同一把锁，计时只唤醒循环，不直接修改状态
// ==========================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use crate::api::ScheduleBoardApi;
use crate::engine::BoardEvent;

/// 默认重算周期（1 Hz）
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// 运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub advances: u64,
}

/// 运行看板循环，直到 shutdown 完成
pub async fn run_board<F>(
    board: Arc<Mutex<ScheduleBoardApi>>,
    tick_period: Duration,
    shutdown: F,
) -> RuntimeStats
where
    F: Future<Output = ()>,
{
    let mut stats = RuntimeStats::default();
    let mut ticker = interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    tracing::info!(period_ms = tick_period.as_millis() as u64, "看板循环启动");

    loop {
        let deadline = board.lock().await.advance_deadline();
        let settle = async move {
            match deadline {
                Some(due_at) => sleep_until(instant_for(due_at, Utc::now())).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(ticks = stats.ticks, advances = stats.advances, "看板循环退出");
                break;
            }
            _ = ticker.tick() => {
                tick_once(&board, &mut stats).await;
            }
            _ = settle => {
                tracing::debug!("自动推进计时到期");
                tick_once(&board, &mut stats).await;
            }
        }
    }

    stats
}

async fn tick_once(board: &Arc<Mutex<ScheduleBoardApi>>, stats: &mut RuntimeStats) {
    let outcome = board.lock().await.tick(Utc::now()).await;
    stats.ticks += 1;
    stats.advances += outcome
        .events
        .iter()
        .filter(|e| matches!(e, BoardEvent::AdvanceCommitted { .. }))
        .count() as u64;

    tracing::debug!(
        board_time = %outcome.snapshot.board_time,
        complete = outcome.snapshot.is_complete,
        events = outcome.events.len(),
        "tick"
    );
}

/// 将墙钟截止时刻换算为 tokio Instant（已过期则立即触发）
fn instant_for(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Instant {
    let remaining = deadline
        .signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO);
    Instant::now() + remaining
}

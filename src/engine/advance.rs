// ==========================================
// 反应釜批次排程看板 - 自动推进控制器
// ==========================================
// 状态机: Idle → Pending(结算计时) → Committing → Idle
// 规则:
// - 窗口全部结束且未停机 → 进入 Pending，计时 3 秒
// - 到期前条件失效（停机/覆写变化）→ 取消，回到 Idle，不做任何提交
// - 到期时由调用方用“提交时刻”重新生成的矩阵取推进参数
// 红线: 核心中唯一修改状态的操作
// ==========================================

use crate::domain::schedule::{AdvanceParams, ItemKey, ScheduleConfig};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// 结算延迟（秒）
pub const SETTLING_DELAY_SECONDS: i64 = 3;

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdvanceState {
    Idle,
    Pending { due_at: DateTime<Utc> },
    Committing,
}

/// 单次观测产生的状态迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerTransition {
    /// 无变化
    Unchanged,
    /// 已启动结算计时
    Armed { due_at: DateTime<Utc> },
    /// 计时已取消
    Cancelled,
    /// 计时到期，调用方应立即提交
    ReadyToCommit,
}

/// AutoAdvanceController - 自动推进控制器
#[derive(Debug, Clone)]
pub struct AutoAdvanceController {
    state: AdvanceState,
    settling_delay: Duration,
}

impl AutoAdvanceController {
    pub fn new() -> Self {
        Self::with_settling_delay(Duration::seconds(SETTLING_DELAY_SECONDS))
    }

    pub fn with_settling_delay(settling_delay: Duration) -> Self {
        Self {
            state: AdvanceState::Idle,
            settling_delay,
        }
    }

    pub fn state(&self) -> AdvanceState {
        self.state
    }

    /// 当前待触发的截止时刻（仅 Pending 时存在）
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            AdvanceState::Pending { due_at } => Some(due_at),
            _ => None,
        }
    }

    /// 根据本轮完成信号推进状态机
    ///
    /// # 说明
    /// - Pending 期间重复观测到完成不会重置截止时刻
    /// - 只有条件仍成立且已到期时才返回 ReadyToCommit
    pub fn observe(
        &mut self,
        is_complete: bool,
        is_stopped: bool,
        now: DateTime<Utc>,
    ) -> ControllerTransition {
        let eligible = is_complete && !is_stopped;

        match self.state {
            AdvanceState::Idle => {
                if !eligible {
                    return ControllerTransition::Unchanged;
                }
                let due_at = now
                    .checked_add_signed(self.settling_delay)
                    .unwrap_or(now);
                self.state = AdvanceState::Pending { due_at };
                tracing::debug!(%due_at, "窗口已全部结束，启动自动推进计时");
                ControllerTransition::Armed { due_at }
            }
            AdvanceState::Pending { due_at } => {
                if !eligible {
                    self.state = AdvanceState::Idle;
                    tracing::debug!(%due_at, "完成条件失效，取消自动推进计时");
                    ControllerTransition::Cancelled
                } else if now >= due_at {
                    self.state = AdvanceState::Committing;
                    ControllerTransition::ReadyToCommit
                } else {
                    ControllerTransition::Unchanged
                }
            }
            AdvanceState::Committing => ControllerTransition::Unchanged,
        }
    }

    /// 提交完成，回到 Idle
    pub fn finish_commit(&mut self) {
        self.state = AdvanceState::Idle;
    }

    /// 外部强制取消（如重置序列）
    ///
    /// # 返回
    /// - true: 确实取消了一个待触发的计时
    pub fn cancel(&mut self) -> bool {
        let was_pending = matches!(self.state, AdvanceState::Pending { .. });
        self.state = AdvanceState::Idle;
        was_pending
    }
}

impl Default for AutoAdvanceController {
    fn default() -> Self {
        Self::new()
    }
}

/// 应用推进参数并回收过期覆写
///
/// # 返回
/// - 被删除的覆写键（批号小于新基准批号）
pub fn apply_advance(config: &mut ScheduleConfig, params: AdvanceParams) -> Vec<ItemKey> {
    config.base_batch_number = params.batch;
    config.base_start_time = params.time;

    let stale: Vec<ItemKey> = config
        .item_configs
        .keys()
        .filter(|key| key.batch_number < params.batch)
        .cloned()
        .collect();

    for key in &stale {
        config.item_configs.remove(key);
    }

    stale
}

// ==========================================
// 反应釜批次排程看板 - 提醒与播报
// ==========================================
// 职责:
// - 全屏提醒: 找出阈值内即将开始的第一格
// - 开始播报: 每个排程格进入 active 时只播报一次
// - 延迟文案与时间格式化
// ==========================================

use crate::domain::schedule::{ItemKey, ScheduleItem, ScheduleMatrix};
use crate::domain::types::ItemStatus;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// 已播报集合的上限，超过后整体清空
pub const ANNOUNCED_CAPACITY: usize = 50;

/// 查找需要全屏提醒的排程格
///
/// # 规则
/// - 停机或阈值为 0 时不提醒
/// - 按扁平顺序取第一个：非 past/skipped、未被关闭、距开始 (0, 阈值] 秒
pub fn impending_alert<'a>(
    matrix: &'a ScheduleMatrix,
    now: DateTime<Utc>,
    threshold_seconds: u32,
    is_stopped: bool,
    dismissed: &HashSet<ItemKey>,
) -> Option<&'a ScheduleItem> {
    if is_stopped || threshold_seconds == 0 {
        return None;
    }

    let threshold_ms = i64::from(threshold_seconds) * 1000;
    matrix.flat().into_iter().find(|item| {
        if item.status.is_settled() || dismissed.contains(&item.key) {
            return false;
        }
        let until_start_ms = item.start_time.signed_duration_since(now).num_milliseconds();
        until_start_ms > 0 && until_start_ms <= threshold_ms
    })
}

/// 开始播报跟踪器
#[derive(Debug, Default)]
pub struct AnnouncementTracker {
    announced: HashSet<ItemKey>,
}

impl AnnouncementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 收集本轮新进入 active 的排程格（每格只返回一次）
    pub fn collect_new<'a>(&mut self, matrix: &'a ScheduleMatrix) -> Vec<&'a ScheduleItem> {
        let fresh: Vec<&ScheduleItem> = matrix
            .flat()
            .into_iter()
            .filter(|item| item.status == ItemStatus::Active)
            .filter(|item| self.announced.insert(item.key.clone()))
            .collect();

        if self.announced.len() > ANNOUNCED_CAPACITY {
            self.announced.clear();
        }

        fresh
    }

    pub fn clear(&mut self) {
        self.announced.clear();
    }

    pub fn len(&self) -> usize {
        self.announced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.announced.is_empty()
    }
}

/// 延迟文案
///
/// # 返回
/// - "ON TIME": 未晚于目标时间
/// - "{h}h {m}m DELAY": 晚点，小时为 0 时省略
pub fn delay_label(target: DateTime<Utc>, current: DateTime<Utc>) -> String {
    let diff_ms = current.signed_duration_since(target).num_milliseconds();
    let diff_minutes = diff_ms.div_euclid(60_000);
    if diff_minutes <= 0 {
        return "ON TIME".to_string();
    }

    let hours = diff_minutes / 60;
    let minutes = diff_minutes % 60;
    if hours > 0 {
        format!("{}h {}m DELAY", hours, minutes)
    } else {
        format!("{}m DELAY", minutes)
    }
}

/// 时间格式 HH:MM（24 小时制）
pub fn format_time(t: DateTime<Utc>) -> String {
    t.format("%H:%M").to_string()
}

/// 日期格式 DD Mon
pub fn format_date(t: DateTime<Utc>) -> String {
    t.format("%d %b").to_string()
}

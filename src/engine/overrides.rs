// ==========================================
// 反应釜批次排程看板 - 人工覆写编辑
// ==========================================
// 职责: 改期表单的草稿状态与转换规则
// - 切换 OPEN 提前 30 分钟，切换 CLOSE 推后 30 分钟
// - 人工延迟累加到草稿时间与累计延迟分钟
// - 牌号与看板当前牌号相同时不落覆写
// ==========================================

use crate::domain::schedule::{ItemConfig, ScheduleItem};
use crate::domain::types::{Grade, ItemMode};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// 切换阀门模式时的时间偏移（分钟）
pub const MODE_SWITCH_MINUTES: i64 = 30;

/// 重置序列时的时间取整粒度（分钟）
pub const RESET_ROUNDING_MINUTES: i64 = 5;

/// 可选阶段标签
pub const STAGE_OPTIONS: [&str; 3] = ["Sample Blowing", "Sample Washing", "Sample Air Slurry"];

/// 改期草稿
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideDraft {
    pub time: DateTime<Utc>,
    pub note: String,
    pub is_skipped: bool,
    pub mode: ItemMode,
    pub grade: Grade,
    pub shift_subsequent: bool,
    pub manual_delay_minutes: i64,
    pub stage_info: String,
}

impl OverrideDraft {
    /// 由排程格初始化草稿
    ///
    /// 时间取生效时间并截断到分钟；其余字段取已有覆写，缺省为 CLOSE / 格上牌号。
    pub fn from_item(item: &ScheduleItem) -> Self {
        let existing = item.config.clone().unwrap_or_default();
        Self {
            time: truncate_to_minute(item.start_time),
            note: existing.note.unwrap_or_default(),
            is_skipped: existing.is_skipped.unwrap_or(false),
            mode: existing.mode.unwrap_or_default(),
            grade: existing.grade.unwrap_or(item.grade),
            shift_subsequent: existing.shift_subsequent.unwrap_or(false),
            manual_delay_minutes: existing.manual_delay_minutes.unwrap_or(0),
            stage_info: existing.stage_info.unwrap_or_default(),
        }
    }

    /// 切换阀门模式
    pub fn change_mode(&mut self, mode: ItemMode) {
        if mode == self.mode {
            return;
        }
        let offset = match mode {
            ItemMode::Open => Duration::minutes(-MODE_SWITCH_MINUTES),
            ItemMode::Close => Duration::minutes(MODE_SWITCH_MINUTES),
        };
        self.time = self.time.checked_add_signed(offset).unwrap_or(self.time);
        self.mode = mode;
    }

    /// 追加人工延迟
    ///
    /// # 返回
    /// - false: 合计为 0，草稿不变
    pub fn apply_manual_delay(&mut self, hours: i64, minutes: i64) -> bool {
        let total = hours.saturating_mul(60).saturating_add(minutes);
        if total == 0 {
            return false;
        }
        self.time = self
            .time
            .checked_add_signed(Duration::minutes(total))
            .unwrap_or(self.time);
        self.manual_delay_minutes = self.manual_delay_minutes.saturating_add(total);
        true
    }

    /// 转为覆写记录
    pub fn into_item_config(self, current_grade: Grade) -> ItemConfig {
        ItemConfig {
            override_time: Some(self.time),
            is_skipped: Some(self.is_skipped),
            mode: Some(self.mode),
            grade: (self.grade != current_grade).then_some(self.grade),
            note: non_empty(self.note),
            stage_info: non_empty(self.stage_info),
            shift_subsequent: Some(self.shift_subsequent),
            manual_delay_minutes: Some(self.manual_delay_minutes),
        }
    }
}

/// 重置序列的建议开始时间（取整到最近的 5 分钟）
pub fn suggested_reset_time(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_round(Duration::minutes(RESET_ROUNDING_MINUTES))
        .unwrap_or(now)
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(Duration::minutes(1)).unwrap_or(t)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::{ItemKey, ScheduleConfig};
    use crate::engine::recurrence::RecurrenceGenerator;
    use chrono::TimeZone;

    fn hms(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    fn first_item(config: &ScheduleConfig) -> ScheduleItem {
        RecurrenceGenerator::default()
            .generate(config, hms(0, 0, 0))
            .matrix
            .flat()[0]
            .clone()
    }

    #[test]
    fn test_draft_defaults_from_plain_item() {
        let mut config = ScheduleConfig::new(5164, hms(6, 0, 42));
        config.current_grade = Grade::Se;
        let draft = OverrideDraft::from_item(&first_item(&config));
        assert_eq!(draft.time, hms(6, 0, 0));
        assert_eq!(draft.mode, ItemMode::Close);
        assert_eq!(draft.grade, Grade::Se);
        assert_eq!(draft.manual_delay_minutes, 0);
        assert!(!draft.is_skipped);
    }

    #[test]
    fn test_draft_reads_existing_override() {
        let mut config = ScheduleConfig::new(5164, hms(6, 0, 0));
        config.item_configs.insert(
            ItemKey::new("S", 5164),
            ItemConfig {
                override_time: Some(hms(6, 20, 0)),
                mode: Some(ItemMode::Open),
                manual_delay_minutes: Some(20),
                note: Some("pump check".to_string()),
                ..Default::default()
            },
        );
        let draft = OverrideDraft::from_item(&first_item(&config));
        assert_eq!(draft.time, hms(6, 20, 0));
        assert_eq!(draft.mode, ItemMode::Open);
        assert_eq!(draft.manual_delay_minutes, 20);
        assert_eq!(draft.note, "pump check");
    }

    #[test]
    fn test_mode_switch_moves_time() {
        let config = ScheduleConfig::new(5164, hms(6, 0, 0));
        let mut draft = OverrideDraft::from_item(&first_item(&config));

        draft.change_mode(ItemMode::Open);
        assert_eq!(draft.time, hms(5, 30, 0));
        draft.change_mode(ItemMode::Open);
        assert_eq!(draft.time, hms(5, 30, 0));
        draft.change_mode(ItemMode::Close);
        assert_eq!(draft.time, hms(6, 0, 0));
    }

    #[test]
    fn test_manual_delay_accumulates() {
        let config = ScheduleConfig::new(5164, hms(6, 0, 0));
        let mut draft = OverrideDraft::from_item(&first_item(&config));

        assert!(!draft.apply_manual_delay(0, 0));
        assert!(draft.apply_manual_delay(1, 15));
        assert!(draft.apply_manual_delay(0, 5));
        assert_eq!(draft.time, hms(7, 20, 0));
        assert_eq!(draft.manual_delay_minutes, 80);
    }

    #[test]
    fn test_grade_only_stored_when_different() {
        let config = ScheduleConfig::new(5164, hms(6, 0, 0));
        let draft = OverrideDraft::from_item(&first_item(&config));

        let same = draft.clone().into_item_config(Grade::Sm);
        assert_eq!(same.grade, None);
        assert_eq!(same.override_time, Some(hms(6, 0, 0)));
        assert_eq!(same.note, None);

        let mut changed = draft;
        changed.grade = Grade::Slp;
        assert_eq!(changed.into_item_config(Grade::Sm).grade, Some(Grade::Slp));
    }

    #[test]
    fn test_suggested_reset_time_rounds_to_five_minutes() {
        assert_eq!(suggested_reset_time(hms(6, 2, 10)), hms(6, 0, 0));
        assert_eq!(suggested_reset_time(hms(6, 3, 0)), hms(6, 5, 0));
        assert_eq!(suggested_reset_time(hms(6, 58, 0)), hms(7, 0, 0));
    }
}

// ==========================================
// 反应釜批次排程看板 - 排程递推生成器
// ==========================================
// 职责: 基准配置 + 稀疏覆写 → 完整排程矩阵
// 顺序: 扁平序列（周期在外层，反应釜在内层）
// 红线: 纯函数、全函数；同输入同输出，不修改配置，不返回错误
// ==========================================
//
// 游标规则:
// 1. 覆写时间 + 顺延标记 → 游标时间加上 (覆写时间 - 标称时间)
// 2. 跳过格不推进游标（下一格沿用同一批号、同一标称时间）
// 3. 非跳过格推进一个标称间隔，批号 +1
// ==========================================

use crate::domain::reactor::ReactorSet;
use crate::domain::schedule::{
    AdvanceParams, ItemKey, ReactorSchedule, ScheduleConfig, ScheduleGeneration, ScheduleItem,
    ScheduleMatrix,
};
use crate::engine::status::classify_status;
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};

/// 扁平序列游标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCursor {
    pub time: DateTime<Utc>,
    pub batch: i64,
}

impl SlotCursor {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self {
            time: config.base_start_time,
            batch: config.base_batch_number,
        }
    }

    fn shifted(self, diff: Duration) -> Self {
        Self {
            time: self.time.checked_add_signed(diff).unwrap_or(self.time),
            ..self
        }
    }

    fn advanced(self, interval: Duration) -> Self {
        Self {
            time: self.time.checked_add_signed(interval).unwrap_or(self.time),
            batch: self.batch.saturating_add(1),
        }
    }
}

impl From<SlotCursor> for AdvanceParams {
    fn from(cursor: SlotCursor) -> Self {
        AdvanceParams {
            batch: cursor.batch,
            time: cursor.time,
        }
    }
}

/// 扁平序列中的一个位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub cycle_index: usize,
    pub reactor_index: usize,
    pub global_index: usize,
}

/// RecurrenceGenerator - 排程递推生成器
#[derive(Debug, Clone)]
pub struct RecurrenceGenerator {
    reactors: ReactorSet,
    display_offset: FixedOffset,
}

impl RecurrenceGenerator {
    pub fn new(reactors: ReactorSet) -> Self {
        Self {
            reactors,
            display_offset: Utc.fix(),
        }
    }

    /// 设置“今天”判定所用的时区偏移
    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.display_offset = offset;
        self
    }

    pub fn reactors(&self) -> &ReactorSet {
        &self.reactors
    }

    /// 按扁平顺序列出全部位置
    pub fn slots(&self, columns: u32) -> impl Iterator<Item = Slot> + '_ {
        let reactor_count = self.reactors.len();
        (0..columns as usize).flat_map(move |cycle_index| {
            (0..reactor_count).map(move |reactor_index| Slot {
                cycle_index,
                reactor_index,
                global_index: cycle_index * reactor_count + reactor_index,
            })
        })
    }

    /// 解析单个位置，返回排程格与推进后的游标
    pub fn resolve_slot(
        &self,
        cursor: SlotCursor,
        slot: Slot,
        config: &ScheduleConfig,
        now: DateTime<Utc>,
    ) -> (ScheduleItem, SlotCursor) {
        let reactor_id = self
            .reactors
            .get(slot.reactor_index)
            .map(|r| r.id.clone())
            .unwrap_or_default();
        let key = ItemKey::new(&reactor_id, cursor.batch);
        let item_config = config.item_config(&key).cloned();

        let original_time = cursor.time;
        let mut next = cursor;
        let mut effective_time = original_time;

        if let Some(override_time) = item_config.as_ref().and_then(|c| c.override_time) {
            if item_config.as_ref().map(|c| c.shifts_subsequent()).unwrap_or(false) {
                next = next.shifted(override_time.signed_duration_since(original_time));
            }
            effective_time = override_time;
        }

        let is_skipped = item_config.as_ref().map(|c| c.is_skipped()).unwrap_or(false);
        let grade = item_config
            .as_ref()
            .and_then(|c| c.grade)
            .unwrap_or(config.current_grade);

        let item = ScheduleItem {
            key,
            reactor_id,
            cycle_index: slot.cycle_index,
            global_index: slot.global_index,
            batch_number: cursor.batch,
            original_time,
            start_time: effective_time,
            status: classify_status(effective_time, now, is_skipped),
            delta_minutes: delta_minutes(effective_time, original_time),
            grade,
            is_today: self.same_display_day(effective_time, now),
            config: item_config,
        };

        if !is_skipped {
            next = next.advanced(config.interval());
        }

        (item, next)
    }

    /// 生成完整排程矩阵与下一次推进参数
    pub fn generate(&self, config: &ScheduleConfig, now: DateTime<Utc>) -> ScheduleGeneration {
        let rows: Vec<ReactorSchedule> = self
            .reactors
            .iter()
            .map(|r| ReactorSchedule {
                reactor_id: r.id.clone(),
                items: Vec::with_capacity(config.columns_to_display as usize),
            })
            .collect();

        let (final_cursor, rows) = self.slots(config.columns_to_display).fold(
            (SlotCursor::from_config(config), rows),
            |(cursor, mut rows), slot| {
                let (item, next) = self.resolve_slot(cursor, slot, config, now);
                if let Some(row) = rows.get_mut(slot.reactor_index) {
                    row.items.push(item);
                }
                (next, rows)
            },
        );

        let generation = ScheduleGeneration {
            matrix: ScheduleMatrix { rows },
            next_advance: final_cursor.into(),
        };

        tracing::debug!(
            base_batch = config.base_batch_number,
            items = generation.matrix.len(),
            next_batch = generation.next_advance.batch,
            "排程矩阵生成完成"
        );

        generation
    }

    fn same_display_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        a.with_timezone(&self.display_offset).date_naive()
            == b.with_timezone(&self.display_offset).date_naive()
    }
}

impl Default for RecurrenceGenerator {
    fn default() -> Self {
        Self::new(ReactorSet::standard())
    }
}

/// 相对标称时间的偏差（分钟，四舍五入，0.5 远离零）
pub fn delta_minutes(effective_time: DateTime<Utc>, original_time: DateTime<Utc>) -> i64 {
    let millis = effective_time
        .signed_duration_since(original_time)
        .num_milliseconds();
    (millis as f64 / 60_000.0).round() as i64
}

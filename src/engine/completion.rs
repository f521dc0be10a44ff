// ==========================================
// 反应釜批次排程看板 - 周期完成判定
// ==========================================

use crate::domain::schedule::ScheduleMatrix;

/// 当前可见窗口是否全部结束
///
/// 矩阵非空，且每一格都是 past 或 skipped。
pub fn is_schedule_complete(matrix: &ScheduleMatrix) -> bool {
    !matrix.is_empty() && matrix.items().all(|item| item.status.is_settled())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::{ItemConfig, ItemKey, ScheduleConfig};
    use crate::engine::recurrence::RecurrenceGenerator;
    use chrono::{Duration, TimeZone, Utc};

    fn config() -> ScheduleConfig {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
        let mut config = ScheduleConfig::new(5164, start);
        config.columns_to_display = 1;
        config
    }

    #[test]
    fn test_empty_matrix_is_not_complete() {
        assert!(!is_schedule_complete(&ScheduleMatrix::default()));
    }

    #[test]
    fn test_complete_only_after_last_grace_period() {
        let generator = RecurrenceGenerator::default();
        let config = config();
        let last = config.base_start_time + Duration::minutes(4 * 90);

        let matrix = generator.generate(&config, last + Duration::seconds(60)).matrix;
        assert!(!is_schedule_complete(&matrix));

        let matrix = generator.generate(&config, last + Duration::seconds(61)).matrix;
        assert!(is_schedule_complete(&matrix));
    }

    #[test]
    fn test_skipped_items_count_as_settled() {
        let generator = RecurrenceGenerator::default();
        let mut config = config();
        for reactor in ["S", "T", "U", "V", "W"] {
            config
                .item_configs
                .insert(ItemKey::new(reactor, 5164), ItemConfig::skipped());
        }

        // 全部跳过时即使尚未到达开始时间也视为完成
        let matrix = generator.generate(&config, config.base_start_time - Duration::hours(1)).matrix;
        assert!(is_schedule_complete(&matrix));
    }
}

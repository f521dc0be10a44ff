// ==========================================
// 反应釜批次排程看板 - 排程格状态判定
// ==========================================
// 规则: 跳过优先；开始前 10 秒进入 active，开始后 60 秒内保持 active
// 边界: 两端均为闭区间
// ==========================================

use crate::domain::types::ItemStatus;
use chrono::{DateTime, Duration, Utc};

/// 开始前提前进入 active 的秒数
pub const ACTIVE_LEAD_SECONDS: i64 = 10;
/// 开始后保持 active 的宽限秒数
pub const ACTIVE_GRACE_SECONDS: i64 = 60;

/// 判定排程格状态
///
/// # 参数
/// - effective_time: 生效开始时间
/// - now: 看板时钟（停机时为冻结时刻）
/// - is_skipped: 是否人工跳过
pub fn classify_status(
    effective_time: DateTime<Utc>,
    now: DateTime<Utc>,
    is_skipped: bool,
) -> ItemStatus {
    if is_skipped {
        return ItemStatus::Skipped;
    }

    let elapsed = now.signed_duration_since(effective_time);
    if elapsed > Duration::seconds(ACTIVE_GRACE_SECONDS) {
        ItemStatus::Past
    } else if elapsed >= Duration::seconds(-ACTIVE_LEAD_SECONDS) {
        ItemStatus::Active
    } else {
        ItemStatus::Future
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_skipped_always_wins() {
        let t = start();
        assert_eq!(classify_status(t, t, true), ItemStatus::Skipped);
        assert_eq!(
            classify_status(t, t + Duration::hours(5), true),
            ItemStatus::Skipped
        );
    }

    #[test]
    fn test_lead_boundary() {
        let t = start();
        assert_eq!(
            classify_status(t, t - Duration::seconds(10), false),
            ItemStatus::Active
        );
        assert_eq!(
            classify_status(t, t - Duration::milliseconds(10_001), false),
            ItemStatus::Future
        );
    }

    #[test]
    fn test_grace_boundary() {
        let t = start();
        assert_eq!(
            classify_status(t, t + Duration::seconds(60), false),
            ItemStatus::Active
        );
        assert_eq!(
            classify_status(t, t + Duration::milliseconds(60_001), false),
            ItemStatus::Past
        );
    }

    #[test]
    fn test_exact_start_is_active() {
        let t = start();
        assert_eq!(classify_status(t, t, false), ItemStatus::Active);
    }
}

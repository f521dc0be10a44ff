// ==========================================
// 反应釜批次排程看板 - 排程领域模型
// ==========================================
// 职责: 排程基准配置、单批次覆写、派生排程格
// 红线: ScheduleItem 每轮重算，不落库
// ==========================================

use crate::domain::types::{Grade, ItemMode, ItemStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ==========================================
// ItemKey - 覆写复合键
// ==========================================
// 存储格式: "{reactor_id}-{batch_number}"
// 解析时按最后一个 '-' 拆分，反应釜标识本身允许含 '-'
// 负批号写作 "S--5"：反应釜部分末尾多出的 '-' 归为批号负号
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub reactor_id: String,
    pub batch_number: i64,
}

impl ItemKey {
    pub fn new(reactor_id: &str, batch_number: i64) -> Self {
        Self {
            reactor_id: reactor_id.to_string(),
            batch_number,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.reactor_id, self.batch_number)
    }
}

/// 复合键解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("无效的排程项ID: {0}")]
pub struct ItemKeyParseError(pub String);

impl FromStr for ItemKey {
    type Err = ItemKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (reactor_id, batch) = s
            .rsplit_once('-')
            .ok_or_else(|| ItemKeyParseError(s.to_string()))?;
        let (reactor_id, negative) = match reactor_id.strip_suffix('-') {
            Some(rest) => (rest, true),
            None => (reactor_id, false),
        };
        if reactor_id.is_empty() {
            return Err(ItemKeyParseError(s.to_string()));
        }
        let batch = batch.trim();
        if batch.starts_with(['-', '+']) {
            return Err(ItemKeyParseError(s.to_string()));
        }
        let magnitude = batch
            .parse::<i64>()
            .map_err(|_| ItemKeyParseError(s.to_string()))?;
        let batch_number = if negative { -magnitude } else { magnitude };
        Ok(Self::new(reactor_id, batch_number))
    }
}

impl Serialize for ItemKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ItemKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==========================================
// ItemConfig - 单批次覆写记录
// ==========================================
// override_time 为权威值；manual_delay_minutes 仅用于审计与展示
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    pub override_time: Option<DateTime<Utc>>, // 替换开始时间
    pub is_skipped: Option<bool>,             // 跳过该格（不推进批号）
    pub mode: Option<ItemMode>,               // 阀门模式，缺省 CLOSE
    pub grade: Option<Grade>,                 // 仅本批次的牌号
    pub note: Option<String>,                 // 备注
    pub stage_info: Option<String>,           // 阶段标签
    pub shift_subsequent: Option<bool>,       // 时间差顺延到后续所有格
    pub manual_delay_minutes: Option<i64>,    // 累计人工延迟分钟
}

impl ItemConfig {
    pub fn is_skipped(&self) -> bool {
        self.is_skipped.unwrap_or(false)
    }

    pub fn shifts_subsequent(&self) -> bool {
        self.shift_subsequent.unwrap_or(false)
    }

    pub fn mode(&self) -> ItemMode {
        self.mode.unwrap_or_default()
    }

    /// 仅跳过的覆写
    pub fn skipped() -> Self {
        Self {
            is_skipped: Some(true),
            ..Default::default()
        }
    }

    /// 仅改时间的覆写
    pub fn rescheduled(override_time: DateTime<Utc>, shift_subsequent: bool) -> Self {
        Self {
            override_time: Some(override_time),
            shift_subsequent: Some(shift_subsequent),
            ..Default::default()
        }
    }
}

// ==========================================
// ScheduleConfig - 排程基准配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub base_batch_number: i64,
    pub base_start_time: DateTime<Utc>,
    pub interval_hours: u32,
    pub interval_minutes: u32,
    pub columns_to_display: u32,
    pub item_configs: BTreeMap<ItemKey, ItemConfig>,
    pub current_grade: Grade,
    pub is_stopped: bool,
    pub alert_threshold_seconds: u32,
}

/// 默认起始批号
pub const DEFAULT_BASE_BATCH_NUMBER: i64 = 5164;
/// 默认间隔 1 小时 30 分
pub const DEFAULT_INTERVAL_HOURS: u32 = 1;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 30;
/// 默认显示周期数
pub const DEFAULT_COLUMNS_TO_DISPLAY: u32 = 4;
/// 默认全屏提醒阈值（秒）
pub const DEFAULT_ALERT_THRESHOLD_SECONDS: u32 = 60;

impl ScheduleConfig {
    /// 以默认间隔、列数、牌号创建配置
    pub fn new(base_batch_number: i64, base_start_time: DateTime<Utc>) -> Self {
        Self {
            base_batch_number,
            base_start_time,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            columns_to_display: DEFAULT_COLUMNS_TO_DISPLAY,
            item_configs: BTreeMap::new(),
            current_grade: Grade::default(),
            is_stopped: false,
            alert_threshold_seconds: DEFAULT_ALERT_THRESHOLD_SECONDS,
        }
    }

    /// 相邻扁平格之间的标称间隔
    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_hours) * 60 + i64::from(self.interval_minutes))
    }

    pub fn item_config(&self, key: &ItemKey) -> Option<&ItemConfig> {
        self.item_configs.get(key)
    }
}

// ==========================================
// ScheduleItem - 派生排程格
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleItem {
    pub key: ItemKey,
    pub reactor_id: String,
    pub cycle_index: usize,
    pub global_index: usize,
    pub batch_number: i64,
    pub original_time: DateTime<Utc>, // 未覆写时的标称时间（已含前序顺延）
    pub start_time: DateTime<Utc>,    // 生效时间
    pub status: ItemStatus,
    pub delta_minutes: i64,
    pub grade: Grade,
    pub is_today: bool,
    pub config: Option<ItemConfig>,
}

impl ScheduleItem {
    pub fn is_skipped(&self) -> bool {
        self.config.as_ref().map(ItemConfig::is_skipped).unwrap_or(false)
    }

    pub fn mode(&self) -> ItemMode {
        self.config.as_ref().map(ItemConfig::mode).unwrap_or_default()
    }
}

/// 单台反应釜的一行排程
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactorSchedule {
    pub reactor_id: String,
    pub items: Vec<ScheduleItem>,
}

/// 排程矩阵（行=反应釜，列=周期）
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScheduleMatrix {
    pub rows: Vec<ReactorSchedule>,
}

impl ScheduleMatrix {
    pub fn row(&self, reactor_id: &str) -> Option<&ReactorSchedule> {
        self.rows.iter().find(|r| r.reactor_id == reactor_id)
    }

    /// 全部排程格（按反应釜行遍历）
    pub fn items(&self) -> impl Iterator<Item = &ScheduleItem> {
        self.rows.iter().flat_map(|r| r.items.iter())
    }

    /// 按扁平序列顺序（周期优先，釜次之）排列的排程格
    pub fn flat(&self) -> Vec<&ScheduleItem> {
        let mut all: Vec<&ScheduleItem> = self.items().collect();
        all.sort_by_key(|item| item.global_index);
        all
    }

    pub fn find(&self, key: &ItemKey) -> Option<&ScheduleItem> {
        self.items().find(|item| &item.key == key)
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(|r| r.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 下一次推进参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdvanceParams {
    pub batch: i64,
    pub time: DateTime<Utc>,
}

/// 一轮生成结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleGeneration {
    pub matrix: ScheduleMatrix,
    pub next_advance: AdvanceParams,
}

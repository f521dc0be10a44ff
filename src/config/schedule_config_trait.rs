// ==========================================
// 反应釜批次排程看板 - 排程配置读取 Trait
// ==========================================
// 职责: 定义看板所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::schedule::{
    ItemConfig, ItemKey, ScheduleConfig, DEFAULT_ALERT_THRESHOLD_SECONDS,
    DEFAULT_BASE_BATCH_NUMBER, DEFAULT_COLUMNS_TO_DISPLAY, DEFAULT_INTERVAL_HOURS,
    DEFAULT_INTERVAL_MINUTES,
};
use crate::domain::types::Grade;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// BoardSettings - 看板设置单例
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSettings {
    pub base_batch_number: i64,
    pub base_start_time: DateTime<Utc>,
    pub interval_hours: u32,
    pub interval_minutes: u32,
    pub columns_to_display: u32,
    pub current_grade: Grade,
    pub is_stopped: bool,
    pub alert_threshold_seconds: u32,
}

impl BoardSettings {
    /// 首次启动的默认设置（基准时间取当前时刻）
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            base_batch_number: DEFAULT_BASE_BATCH_NUMBER,
            base_start_time: now,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            columns_to_display: DEFAULT_COLUMNS_TO_DISPLAY,
            current_grade: Grade::default(),
            is_stopped: false,
            alert_threshold_seconds: DEFAULT_ALERT_THRESHOLD_SECONDS,
        }
    }

    /// 合并覆写记录得到排程配置
    pub fn into_schedule_config(self, item_configs: BTreeMap<ItemKey, ItemConfig>) -> ScheduleConfig {
        ScheduleConfig {
            base_batch_number: self.base_batch_number,
            base_start_time: self.base_start_time,
            interval_hours: self.interval_hours,
            interval_minutes: self.interval_minutes,
            columns_to_display: self.columns_to_display,
            item_configs,
            current_grade: self.current_grade,
            is_stopped: self.is_stopped,
            alert_threshold_seconds: self.alert_threshold_seconds,
        }
    }

    /// 从排程配置提取设置部分
    pub fn from_schedule_config(config: &ScheduleConfig) -> Self {
        Self {
            base_batch_number: config.base_batch_number,
            base_start_time: config.base_start_time,
            interval_hours: config.interval_hours,
            interval_minutes: config.interval_minutes,
            columns_to_display: config.columns_to_display,
            current_grade: config.current_grade,
            is_stopped: config.is_stopped,
            alert_threshold_seconds: config.alert_threshold_seconds,
        }
    }
}

// ==========================================
// ScheduleConfigReader Trait
// ==========================================
// 用途: 看板启动时读取设置单例
// 实现者: ConfigManager（从 config_kv 表读取）
// 约定: 缺失值取默认值；格式错误的值强制转换为安全值（0 / 当前时刻 / 默认牌号）
#[async_trait]
pub trait ScheduleConfigReader: Send + Sync {
    /// 获取基准批号
    ///
    /// # 默认值
    /// - 缺失: 5164
    /// - 格式错误: 0
    async fn get_base_batch_number(&self) -> ConfigResult<i64>;

    /// 获取基准开始时间
    ///
    /// # 默认值
    /// - 缺失或格式错误: now
    async fn get_base_start_time(&self, now: DateTime<Utc>) -> ConfigResult<DateTime<Utc>>;

    /// 获取间隔小时 (0-23)
    async fn get_interval_hours(&self) -> ConfigResult<u32>;

    /// 获取间隔分钟 (0-59)
    async fn get_interval_minutes(&self) -> ConfigResult<u32>;

    /// 获取显示周期数 (1-10)
    async fn get_columns_to_display(&self) -> ConfigResult<u32>;

    /// 获取看板当前牌号
    async fn get_current_grade(&self) -> ConfigResult<Grade>;

    /// 获取停机标记
    async fn get_is_stopped(&self) -> ConfigResult<bool>;

    /// 获取全屏提醒阈值（秒）
    async fn get_alert_threshold_seconds(&self) -> ConfigResult<u32>;

    /// 读取完整设置单例
    async fn load_board_settings(&self, now: DateTime<Utc>) -> ConfigResult<BoardSettings> {
        Ok(BoardSettings {
            base_batch_number: self.get_base_batch_number().await?,
            base_start_time: self.get_base_start_time(now).await?,
            interval_hours: self.get_interval_hours().await?,
            interval_minutes: self.get_interval_minutes().await?,
            columns_to_display: self.get_columns_to_display().await?,
            current_grade: self.get_current_grade().await?,
            is_stopped: self.get_is_stopped().await?,
            alert_threshold_seconds: self.get_alert_threshold_seconds().await?,
        })
    }
}

// ==========================================
// 反应釜批次排程看板 - 配置管理器
// ==========================================
// 职责: 看板设置单例的加载、强制转换、写回
// 存储: config_kv 表 (scope_id='global')
// ==========================================

use crate::config::schedule_config_trait::{BoardSettings, ConfigResult, ScheduleConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::schedule::{
    DEFAULT_ALERT_THRESHOLD_SECONDS, DEFAULT_BASE_BATCH_NUMBER, DEFAULT_COLUMNS_TO_DISPLAY,
    DEFAULT_INTERVAL_HOURS, DEFAULT_INTERVAL_MINUTES,
};
use crate::domain::types::Grade;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 显示周期数上下限
pub const MIN_COLUMNS_TO_DISPLAY: u32 = 1;
pub const MAX_COLUMNS_TO_DISPLAY: u32 = 10;

/// 可接受的无时区时间格式（按 UTC 解释）
const NAIVE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// 解析时间戳
///
/// 支持 RFC3339 以及不带时区的 "YYYY-MM-DDTHH:MM[:SS]" / "YYYY-MM-DD HH:MM[:SS]"
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// 时间戳序列化格式（毫秒精度 RFC3339）
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager（建表幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            init_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入单个配置值（Upsert）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// 批量写入配置值（单事务）
    pub fn set_config_values(&self, entries: &[(&str, String)]) -> ConfigResult<usize> {
        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO config_kv (scope_id, key, value, updated_at)
                 VALUES ('global', ?1, ?2, datetime('now'))
                 ON CONFLICT(scope_id, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
            )?;
            for (key, value) in entries {
                count += stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// 写回完整设置单例
    pub fn save_board_settings(&self, settings: &BoardSettings) -> ConfigResult<usize> {
        self.set_config_values(&[
            (config_keys::BASE_BATCH_NUMBER, settings.base_batch_number.to_string()),
            (config_keys::BASE_START_TIME, format_timestamp(settings.base_start_time)),
            (config_keys::INTERVAL_HOURS, settings.interval_hours.to_string()),
            (config_keys::INTERVAL_MINUTES, settings.interval_minutes.to_string()),
            (config_keys::COLUMNS_TO_DISPLAY, settings.columns_to_display.to_string()),
            (config_keys::CURRENT_GRADE, settings.current_grade.as_str().to_string()),
            (config_keys::IS_STOPPED, settings.is_stopped.to_string()),
            (
                config_keys::ALERT_THRESHOLD_SECONDS,
                settings.alert_threshold_seconds.to_string(),
            ),
        ])
    }

    /// 写回基准（批号 + 开始时间，单事务）
    pub fn save_base(&self, batch_number: i64, start_time: DateTime<Utc>) -> ConfigResult<()> {
        self.set_config_values(&[
            (config_keys::BASE_BATCH_NUMBER, batch_number.to_string()),
            (config_keys::BASE_START_TIME, format_timestamp(start_time)),
        ])?;
        Ok(())
    }

    /// 是否已存在设置单例
    pub fn has_settings(&self) -> ConfigResult<bool> {
        Ok(self.get_config_value(config_keys::BASE_BATCH_NUMBER)?.is_some())
    }

    fn get_i64(&self, key: &str, missing: i64) -> ConfigResult<i64> {
        let value = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(missing),
        };
        Ok(value.trim().parse::<i64>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %value, "配置值无法解析为整数，按 0 处理");
            0
        }))
    }

    fn get_u32_clamped(&self, key: &str, missing: u32, min: u32, max: u32) -> ConfigResult<u32> {
        let raw = self.get_i64(key, i64::from(missing))?;
        let clamped = raw.clamp(i64::from(min), i64::from(max));
        if clamped != raw {
            tracing::warn!(config_key = key, raw_value = raw, clamped, "配置值越界，已截断");
        }
        // clamp 后必然落在 u32 范围内
        Ok(u32::try_from(clamped).unwrap_or(min))
    }
}

// ==========================================
// ScheduleConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ScheduleConfigReader for ConfigManager {
    async fn get_base_batch_number(&self) -> ConfigResult<i64> {
        self.get_i64(config_keys::BASE_BATCH_NUMBER, DEFAULT_BASE_BATCH_NUMBER)
    }

    async fn get_base_start_time(&self, now: DateTime<Utc>) -> ConfigResult<DateTime<Utc>> {
        let value = match self.get_config_value(config_keys::BASE_START_TIME)? {
            Some(v) => v,
            None => return Ok(now),
        };
        Ok(parse_timestamp(&value).unwrap_or_else(|| {
            tracing::warn!(
                config_key = config_keys::BASE_START_TIME,
                raw_value = %value,
                "基准时间无法解析，使用当前时刻"
            );
            now
        }))
    }

    async fn get_interval_hours(&self) -> ConfigResult<u32> {
        self.get_u32_clamped(config_keys::INTERVAL_HOURS, DEFAULT_INTERVAL_HOURS, 0, 23)
    }

    async fn get_interval_minutes(&self) -> ConfigResult<u32> {
        self.get_u32_clamped(config_keys::INTERVAL_MINUTES, DEFAULT_INTERVAL_MINUTES, 0, 59)
    }

    async fn get_columns_to_display(&self) -> ConfigResult<u32> {
        self.get_u32_clamped(
            config_keys::COLUMNS_TO_DISPLAY,
            DEFAULT_COLUMNS_TO_DISPLAY,
            MIN_COLUMNS_TO_DISPLAY,
            MAX_COLUMNS_TO_DISPLAY,
        )
    }

    async fn get_current_grade(&self) -> ConfigResult<Grade> {
        let value = match self.get_config_value(config_keys::CURRENT_GRADE)? {
            Some(v) => v,
            None => return Ok(Grade::default()),
        };
        Ok(Grade::parse(&value).unwrap_or_else(|| {
            tracing::warn!(
                config_key = config_keys::CURRENT_GRADE,
                raw_value = %value,
                "未知牌号，使用默认牌号"
            );
            Grade::default()
        }))
    }

    async fn get_is_stopped(&self) -> ConfigResult<bool> {
        let value = match self.get_config_value(config_keys::IS_STOPPED)? {
            Some(v) => v,
            None => return Ok(false),
        };
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => {
                tracing::warn!(config_key = config_keys::IS_STOPPED, raw_value = %value, "停机标记无法解析，按运行处理");
                Ok(false)
            }
        }
    }

    async fn get_alert_threshold_seconds(&self) -> ConfigResult<u32> {
        self.get_u32_clamped(
            config_keys::ALERT_THRESHOLD_SECONDS,
            DEFAULT_ALERT_THRESHOLD_SECONDS,
            0,
            u32::MAX,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 基准
    pub const BASE_BATCH_NUMBER: &str = "base_batch_number";
    pub const BASE_START_TIME: &str = "base_start_time";

    // 间隔
    pub const INTERVAL_HOURS: &str = "interval_hours";
    pub const INTERVAL_MINUTES: &str = "interval_minutes";

    // 展示
    pub const COLUMNS_TO_DISPLAY: &str = "columns_to_display";
    pub const CURRENT_GRADE: &str = "current_grade";
    pub const IS_STOPPED: &str = "is_stopped";
    pub const ALERT_THRESHOLD_SECONDS: &str = "alert_threshold_seconds";
}

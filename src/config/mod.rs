// ==========================================
// 反应釜批次排程看板 - 配置层
// ==========================================
// 职责: 看板设置单例的读取与写回
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod schedule_config_trait;

// 重导出核心配置管理器
pub use config_manager::{
    config_keys, format_timestamp, parse_timestamp, ConfigManager, MAX_COLUMNS_TO_DISPLAY,
    MIN_COLUMNS_TO_DISPLAY,
};
pub use schedule_config_trait::{BoardSettings, ConfigResult, ScheduleConfigReader};

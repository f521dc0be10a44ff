// ==========================================
// 反应釜批次排程看板 - 核心库
// ==========================================
// 技术栈: Rust + Tokio + SQLite
// 系统定位: 反应釜批次排程的递推、覆写解析与自动推进
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 排程递推与自动推进
pub mod engine;

// 配置层 - 看板设置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 看板会话
pub mod api;

// 应用层 - 运行时循环
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Grade, ItemMode, ItemStatus};

// 领域实体
pub use domain::{
    AdvanceParams, ItemConfig, ItemKey, ReactorDefinition, ReactorSet, ScheduleConfig,
    ScheduleGeneration, ScheduleItem, ScheduleMatrix,
};

// 引擎
pub use engine::{
    apply_advance, classify_status, is_schedule_complete, AutoAdvanceController,
    RecurrenceGenerator,
};

// API
pub use api::{BoardSnapshot, ScheduleBoardApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "反应釜批次排程看板";

// 数据库版本
pub const DB_VERSION: &str = "v1";

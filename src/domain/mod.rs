// ==========================================
// 反应釜批次排程看板 - 领域模型层
// ==========================================
// 职责: 定义反应釜、排程配置、覆写记录、派生排程格
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod reactor;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use reactor::{ReactorDefinition, ReactorSet};
pub use schedule::{
    AdvanceParams, ItemConfig, ItemKey, ItemKeyParseError, ReactorSchedule, ScheduleConfig,
    ScheduleGeneration, ScheduleItem, ScheduleMatrix,
};
pub use types::{Grade, ItemMode, ItemStatus};

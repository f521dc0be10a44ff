// ==========================================
// 反应釜批次排程看板 - API 层
// ==========================================
// 职责: 提供看板会话 API,供运行时与展示层调用
// ==========================================

pub mod board_api;
pub mod error;

// 重导出核心类型
pub use board_api::{BoardSnapshot, ScheduleBoardApi, TickOutcome};
pub use error::{ApiError, ApiResult};
